use super::{InboundMessage, MediaPayload, Recipient, Transport, TransportEvent};
use crate::error::TransportError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type ReadyHook = Box<dyn FnOnce() + Send>;
type ChallengeHook = Arc<dyn Fn(&str) + Send + Sync>;
type MessageHook = Arc<dyn Fn(InboundMessage) + Send + Sync>;

#[derive(Default)]
struct Hooks {
    ready: Vec<ReadyHook>,
    challenge: Vec<ChallengeHook>,
    message: Vec<MessageHook>,
}

/// Wraps a [`Transport`] and dispatches its lifecycle signals to registered
/// hooks. `on_ready` hooks fire at most once; sends are refused until then.
pub struct TransportAdapter {
    transport: Arc<dyn Transport>,
    hooks: Arc<Mutex<Hooks>>,
    ready_tx: watch::Sender<bool>,
    cancellation_token: CancellationToken,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
}

impl TransportAdapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            transport,
            hooks: Arc::new(Mutex::new(Hooks::default())),
            ready_tx,
            cancellation_token: CancellationToken::new(),
            dispatch_task: Mutex::new(None),
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.ready_tx.borrow()
    }

    /// Run `hook` once the transport is ready (immediately if it already is)
    pub fn on_ready<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // Readiness only flips while the hooks lock is held
        let mut hooks = self.hooks.lock();
        if self.is_ready() {
            drop(hooks);
            hook();
            return;
        }
        hooks.ready.push(Box::new(hook));
    }

    pub fn on_pairing_challenge<F>(&self, hook: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.hooks.lock().challenge.push(Arc::new(hook));
    }

    pub fn on_inbound_message<F>(&self, hook: F)
    where
        F: Fn(InboundMessage) + Send + Sync + 'static,
    {
        self.hooks.lock().message.push(Arc::new(hook));
    }

    /// Start the transport and the signal dispatch loop
    pub async fn start(&self) -> Result<(), TransportError> {
        info!("Starting {} transport", self.transport.name());

        let (events_tx, mut events_rx) = mpsc::channel(32);
        self.transport.start(events_tx).await?;

        let hooks = Arc::clone(&self.hooks);
        let ready_tx = self.ready_tx.clone();
        let token = self.cancellation_token.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    event = events_rx.recv() => match event {
                        Some(event) => Self::dispatch(&hooks, &ready_tx, event),
                        None => {
                            warn!("Transport event channel closed");
                            break;
                        }
                    }
                }
            }
            debug!("Transport dispatch loop exited");
        });

        *self.dispatch_task.lock() = Some(task);
        Ok(())
    }

    fn dispatch(hooks: &Mutex<Hooks>, ready_tx: &watch::Sender<bool>, event: TransportEvent) {
        match event {
            TransportEvent::Ready => {
                if *ready_tx.borrow() {
                    debug!("Ignoring repeated ready signal");
                    return;
                }
                info!("Transport ready");
                let pending = {
                    let mut hooks = hooks.lock();
                    ready_tx.send_replace(true);
                    std::mem::take(&mut hooks.ready)
                };
                for hook in pending {
                    hook();
                }
            }
            TransportEvent::PairingChallenge(data) => {
                let handlers = hooks.lock().challenge.clone();
                if handlers.is_empty() {
                    info!("Pairing challenge received but no handler registered");
                }
                for handler in handlers {
                    handler(&data);
                }
            }
            TransportEvent::InboundMessage(message) => {
                debug!("Inbound message from {}", message.sender);
                let handlers = hooks.lock().message.clone();
                for handler in handlers {
                    handler(message.clone());
                }
            }
        }
    }

    /// Wait until `Ready` has been dispatched
    pub async fn wait_ready(&self, limit: Duration) -> Result<(), TransportError> {
        let mut ready_rx = self.ready_tx.subscribe();
        let waited = tokio::time::timeout(limit, ready_rx.wait_for(|ready| *ready))
            .await
            .map(|changed| changed.map(|_| ()));
        match waited {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(TransportError::Startup(
                "ready signal channel closed".to_string(),
            )),
            Err(_) => Err(TransportError::Startup(format!(
                "{} transport not ready within {:?}",
                self.transport.name(),
                limit
            ))),
        }
    }

    pub async fn send_media(
        &self,
        recipient: &Recipient,
        media: &MediaPayload,
    ) -> Result<(), TransportError> {
        if !self.is_ready() {
            return Err(TransportError::NotReady);
        }
        self.transport.send_media(recipient, media).await
    }

    pub async fn send_text(&self, recipient: &Recipient, text: &str) -> Result<(), TransportError> {
        if !self.is_ready() {
            return Err(TransportError::NotReady);
        }
        self.transport.send_text(recipient, text).await
    }

    pub async fn stop(&self) -> Result<(), TransportError> {
        info!("Stopping {} transport", self.transport.name());
        self.cancellation_token.cancel();
        let task = self.dispatch_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        self.transport.stop().await
    }
}
