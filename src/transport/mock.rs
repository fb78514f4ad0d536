use super::{InboundMessage, MediaPayload, Recipient, Transport, TransportEvent};
use crate::error::TransportError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// Recording transport for tests
pub struct MockTransport {
    auto_ready: bool,
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    media: Mutex<Vec<(Recipient, MediaPayload)>>,
    texts: Mutex<Vec<(Recipient, String)>>,
    send_failures_remaining: AtomicUsize,
    stopped: AtomicBool,
}

impl MockTransport {
    /// A transport that reports `Ready` as soon as it starts
    pub fn new() -> Self {
        Self::with_auto_ready(true)
    }

    pub fn with_auto_ready(auto_ready: bool) -> Self {
        Self {
            auto_ready,
            events: Mutex::new(None),
            media: Mutex::new(Vec::new()),
            texts: Mutex::new(Vec::new()),
            send_failures_remaining: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    /// Fail the next `count` send calls (media or text)
    pub fn fail_next_sends(&self, count: usize) {
        self.send_failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Push a lifecycle signal as if it came from the remote service
    pub async fn emit(&self, event: TransportEvent) {
        let sender = self.events.lock().clone();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }

    pub async fn emit_message(&self, text: &str, sender: &str) {
        self.emit(TransportEvent::InboundMessage(InboundMessage {
            text: text.to_string(),
            sender: Recipient::new(sender),
        }))
        .await;
    }

    pub fn media(&self) -> Vec<(Recipient, MediaPayload)> {
        self.media.lock().clone()
    }

    pub fn texts(&self) -> Vec<(Recipient, String)> {
        self.texts.lock().clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn take_failure(&self, recipient: &Recipient) -> Result<(), TransportError> {
        let failed = self
            .send_failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(TransportError::SendFailed {
                recipient: recipient.to_string(),
                details: "mock send failure".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn start(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), TransportError> {
        if self.auto_ready {
            events
                .send(TransportEvent::Ready)
                .await
                .map_err(|e| TransportError::Startup(e.to_string()))?;
        }
        *self.events.lock() = Some(events);
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.stopped.store(true, Ordering::SeqCst);
        self.events.lock().take();
        Ok(())
    }

    async fn send_text(&self, recipient: &Recipient, text: &str) -> Result<(), TransportError> {
        self.take_failure(recipient)?;
        self.texts.lock().push((recipient.clone(), text.to_string()));
        Ok(())
    }

    async fn send_media(
        &self,
        recipient: &Recipient,
        media: &MediaPayload,
    ) -> Result<(), TransportError> {
        self.take_failure(recipient)?;
        self.media.lock().push((recipient.clone(), media.clone()));
        Ok(())
    }
}
