//! Messaging transport seam and the adapter that turns transport lifecycle
//! signals into hooks for the rest of the system.

mod adapter;
mod mock;
mod outbox;
#[cfg(feature = "telegram")]
mod telegram;
#[cfg(test)]
mod tests;

pub use adapter::TransportAdapter;
pub use mock::MockTransport;
pub use outbox::OutboxTransport;
#[cfg(feature = "telegram")]
pub use telegram::TelegramTransport;

use crate::config::{TransportBackend, TransportConfig};
use crate::error::{Result, TransportError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Opaque recipient identifier understood by the active transport
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Recipient(String);

impl Recipient {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Recipient {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Image delivered through [`Transport::send_media`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
    pub caption: Option<String>,
}

impl MediaPayload {
    pub fn jpeg(file_name: String, bytes: Vec<u8>, caption: Option<String>) -> Self {
        Self {
            file_name,
            mime_type: "image/jpeg",
            bytes,
            caption,
        }
    }
}

/// Text received from a remote user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub text: String,
    pub sender: Recipient,
}

/// Lifecycle signals raised by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The transport can send from now on
    Ready,
    /// Pairing/authentication data to show to the operator
    PairingChallenge(String),
    InboundMessage(InboundMessage),
}

/// Messaging backend
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Begin receiving; lifecycle signals are pushed into `events`
    async fn start(
        &self,
        events: mpsc::Sender<TransportEvent>,
    ) -> std::result::Result<(), TransportError>;

    async fn stop(&self) -> std::result::Result<(), TransportError>;

    async fn send_text(
        &self,
        recipient: &Recipient,
        text: &str,
    ) -> std::result::Result<(), TransportError>;

    async fn send_media(
        &self,
        recipient: &Recipient,
        media: &MediaPayload,
    ) -> std::result::Result<(), TransportError>;
}

/// Build the configured transport backend
pub fn build_transport(config: &TransportConfig) -> Result<Arc<dyn Transport>> {
    match config.backend {
        TransportBackend::Outbox => Ok(Arc::new(OutboxTransport::new(&config.outbox_dir))),
        TransportBackend::Telegram => build_telegram(config),
    }
}

#[cfg(feature = "telegram")]
fn build_telegram(config: &TransportConfig) -> Result<Arc<dyn Transport>> {
    Ok(Arc::new(TelegramTransport::new(config)?))
}

#[cfg(not(feature = "telegram"))]
fn build_telegram(_config: &TransportConfig) -> Result<Arc<dyn Transport>> {
    Err(crate::error::DoorsnapError::setup(
        "transport",
        "telegram support is not compiled into this build",
    ))
}

