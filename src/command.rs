//! Inbound "take a photo" command: capture once and reply to whoever asked.

use crate::capture::{CaptureOutcome, CaptureRunner, CaptureTrigger};
use crate::config::CommandConfig;
use crate::events::{DoorEvent, EventBus};
use crate::transport::{InboundMessage, TransportAdapter};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct CommandTrigger {
    trigger_word: String,
    ack_text: String,
    failure_text: String,
    runner: Arc<dyn CaptureRunner>,
    transport: Arc<TransportAdapter>,
    event_bus: Arc<EventBus>,
}

impl CommandTrigger {
    pub fn new(
        config: &CommandConfig,
        runner: Arc<dyn CaptureRunner>,
        transport: Arc<TransportAdapter>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            trigger_word: config.trigger_word.to_lowercase(),
            ack_text: config.ack_text.clone(),
            failure_text: config.failure_text.clone(),
            runner,
            transport,
            event_bus,
        }
    }

    /// Whole-message, case-insensitive comparison with the trigger word
    pub fn matches(&self, text: &str) -> bool {
        text.to_lowercase() == self.trigger_word
    }

    /// Handle one inbound message; returns `None` when it was not a command.
    ///
    /// Runs regardless of door state. The photo goes to the sender, never to
    /// the fixed sensor-path recipient.
    pub async fn handle(&self, message: InboundMessage) -> Option<CaptureOutcome> {
        if !self.matches(&message.text) {
            debug!("Ignoring message from {}", message.sender);
            return None;
        }

        info!("Photo requested by {}", message.sender);
        let _ = self.event_bus.publish(DoorEvent::CommandReceived {
            sender: message.sender.to_string(),
        });

        if let Err(e) = self.transport.send_text(&message.sender, &self.ack_text).await {
            warn!("Failed to acknowledge command from {}: {}", message.sender, e);
        }

        let outcome = self
            .runner
            .run_once(&message.sender, CaptureTrigger::Command)
            .await;

        if !outcome.is_delivered() {
            if let Err(e) = self
                .transport
                .send_text(&message.sender, &self.failure_text)
                .await
            {
                warn!("Failed to send failure notice to {}: {}", message.sender, e);
            }
        }

        Some(outcome)
    }

    /// Register with the adapter; each matching message is handled on its own task
    pub fn attach(self: &Arc<Self>, transport: &TransportAdapter) {
        let trigger = Arc::clone(self);
        transport.on_inbound_message(move |message| {
            let trigger = Arc::clone(&trigger);
            tokio::spawn(async move {
                trigger.handle(message).await;
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DoorsnapConfig;
    use crate::transport::{MockTransport, Recipient};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    struct ScriptedRunner {
        succeed: bool,
        calls: Mutex<Vec<(Recipient, CaptureTrigger)>>,
    }

    #[async_trait]
    impl CaptureRunner for ScriptedRunner {
        async fn run_once(&self, recipient: &Recipient, trigger: CaptureTrigger) -> CaptureOutcome {
            self.calls.lock().push((recipient.clone(), trigger));
            if self.succeed {
                CaptureOutcome::Delivered {
                    photo: "photo_x.jpeg".to_string(),
                    attempts: 1,
                }
            } else {
                CaptureOutcome::CaptureFailed {
                    error: "camera unplugged".to_string(),
                }
            }
        }
    }

    async fn setup(
        succeed: bool,
    ) -> (Arc<CommandTrigger>, Arc<ScriptedRunner>, Arc<MockTransport>, Arc<TransportAdapter>) {
        let runner = Arc::new(ScriptedRunner {
            succeed,
            calls: Mutex::new(Vec::new()),
        });
        let mock = Arc::new(MockTransport::new());
        let adapter = Arc::new(TransportAdapter::new(mock.clone()));
        adapter.start().await.unwrap();
        adapter.wait_ready(Duration::from_secs(1)).await.unwrap();

        let config = DoorsnapConfig::default().command;
        let trigger = Arc::new(CommandTrigger::new(
            &config,
            runner.clone(),
            adapter.clone(),
            Arc::new(EventBus::new(16)),
        ));
        (trigger, runner, mock, adapter)
    }

    fn message(text: &str, sender: &str) -> InboundMessage {
        InboundMessage {
            text: text.to_string(),
            sender: Recipient::new(sender),
        }
    }

    #[tokio::test]
    async fn test_trigger_word_is_case_insensitive_exact_match() {
        let (trigger, _, _, _) = setup(true).await;
        assert!(trigger.matches("cam"));
        assert!(trigger.matches("CAM"));
        assert!(trigger.matches("Cam"));
        assert!(!trigger.matches("camera"));
        assert!(!trigger.matches("take cam"));
        assert!(!trigger.matches(""));
    }

    #[tokio::test]
    async fn test_command_replies_to_sender() {
        let (trigger, runner, mock, _) = setup(true).await;

        let outcome = trigger.handle(message("Cam", "chat-7")).await;
        assert!(outcome.unwrap().is_delivered());

        let calls = runner.calls.lock().clone();
        assert_eq!(calls, vec![(Recipient::new("chat-7"), CaptureTrigger::Command)]);
        assert_eq!(
            mock.texts(),
            vec![(Recipient::new("chat-7"), "Taking photo...".to_string())]
        );
    }

    #[tokio::test]
    async fn test_failed_capture_sends_failure_notice() {
        let (trigger, _, mock, _) = setup(false).await;

        let outcome = trigger.handle(message("cam", "chat-9")).await.unwrap();
        assert!(!outcome.is_delivered());

        let texts: Vec<String> = mock.texts().into_iter().map(|(_, text)| text).collect();
        assert_eq!(
            texts,
            vec![
                "Taking photo...".to_string(),
                "Sorry, there was an error taking the photo.".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_other_messages_are_ignored() {
        let (trigger, runner, mock, _) = setup(true).await;
        assert!(trigger.handle(message("hello", "chat-1")).await.is_none());
        assert!(runner.calls.lock().is_empty());
        assert!(mock.texts().is_empty());
    }

    #[tokio::test]
    async fn test_attached_trigger_handles_inbound_messages() {
        let (trigger, runner, mock, adapter) = setup(true).await;
        trigger.attach(&adapter);

        mock.emit_message("CAM", "chat-3").await;
        for _ in 0..20 {
            if !runner.calls.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(runner.calls.lock().len(), 1);
    }
}
