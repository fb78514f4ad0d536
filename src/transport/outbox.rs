use super::{MediaPayload, Recipient, Transport, TransportEvent};
use crate::error::TransportError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// File-backed transport: every delivery lands in a local directory.
///
/// Photos are written as `<recipient>_<file name>` next to a JSON sidecar
/// describing the delivery; text messages are appended to `messages.log`.
pub struct OutboxTransport {
    dir: PathBuf,
}

#[derive(Debug, Serialize)]
struct DeliveryRecord<'a> {
    recipient: &'a str,
    file_name: &'a str,
    mime_type: &'a str,
    caption: Option<&'a str>,
    size_bytes: usize,
    delivered_at: DateTime<Utc>,
}

impl OutboxTransport {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn recipient_prefix(recipient: &Recipient) -> String {
        recipient
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect()
    }

    fn io_error(recipient: &Recipient, err: std::io::Error) -> TransportError {
        TransportError::SendFailed {
            recipient: recipient.to_string(),
            details: err.to_string(),
        }
    }
}

#[async_trait]
impl Transport for OutboxTransport {
    fn name(&self) -> &'static str {
        "outbox"
    }

    async fn start(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), TransportError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            TransportError::Startup(format!(
                "cannot create outbox directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;
        info!("Outbox transport writing to {}", self.dir.display());

        events
            .send(TransportEvent::Ready)
            .await
            .map_err(|e| TransportError::Startup(e.to_string()))
    }

    async fn stop(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send_text(&self, recipient: &Recipient, text: &str) -> Result<(), TransportError> {
        let path = self.dir.join("messages.log");
        let line = format!("{} {} {}\n", Utc::now().to_rfc3339(), recipient, text);

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| Self::io_error(recipient, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| Self::io_error(recipient, e))?;
        file.flush().await.map_err(|e| Self::io_error(recipient, e))?;
        Ok(())
    }

    async fn send_media(
        &self,
        recipient: &Recipient,
        media: &MediaPayload,
    ) -> Result<(), TransportError> {
        let stored_name = format!("{}_{}", Self::recipient_prefix(recipient), media.file_name);
        let photo_path = self.dir.join(&stored_name);

        tokio::fs::write(&photo_path, &media.bytes)
            .await
            .map_err(|e| Self::io_error(recipient, e))?;

        let record = DeliveryRecord {
            recipient: recipient.as_str(),
            file_name: &media.file_name,
            mime_type: media.mime_type,
            caption: media.caption.as_deref(),
            size_bytes: media.bytes.len(),
            delivered_at: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&record).map_err(|e| TransportError::SendFailed {
            recipient: recipient.to_string(),
            details: e.to_string(),
        })?;
        tokio::fs::write(photo_path.with_extension("json"), json)
            .await
            .map_err(|e| Self::io_error(recipient, e))?;

        debug!("Stored {} for {}", stored_name, recipient);
        Ok(())
    }
}
