//! Telegram Bot API transport using teloxide long-polling.

use super::{InboundMessage, MediaPayload, Recipient, Transport, TransportEvent};
use crate::config::TransportConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct TelegramTransport {
    bot: Bot,
    cancel_token: CancellationToken,
}

impl TelegramTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let token = config
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| TransportError::Config("telegram bot_token is required".to_string()))?;

        Ok(Self {
            bot: Bot::new(token),
            cancel_token: CancellationToken::new(),
        })
    }

    fn chat_id(recipient: &Recipient) -> Result<ChatId, TransportError> {
        recipient
            .as_str()
            .trim()
            .parse::<i64>()
            .map(ChatId)
            .map_err(|_| TransportError::InvalidRecipient(recipient.to_string()))
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn start(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), TransportError> {
        use teloxide::dispatching::{Dispatcher, UpdateFilterExt};
        use teloxide::types::{Message, Update};

        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| TransportError::Startup(format!("bot authentication failed: {}", e)))?;
        info!("Authenticated as @{}", me.username());

        // Users open this link and press Start to pair a chat with the bot
        let link = format!("https://t.me/{}", me.username());
        let _ = events.send(TransportEvent::PairingChallenge(link)).await;
        let _ = events.send(TransportEvent::Ready).await;

        let bot = self.bot.clone();
        let cancel = self.cancel_token.clone();

        tokio::spawn(async move {
            let handler = Update::filter_message().endpoint(move |msg: Message, _bot: Bot| {
                let tx = events.clone();
                async move {
                    if let Some(text) = msg.text() {
                        let inbound = InboundMessage {
                            text: text.to_string(),
                            sender: Recipient::new(msg.chat.id.0.to_string()),
                        };
                        if tx.send(TransportEvent::InboundMessage(inbound)).await.is_err() {
                            debug!("Inbound message dropped, adapter stopped");
                        }
                    }
                    Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
                }
            });

            let mut dispatcher = Dispatcher::builder(bot, handler).build();
            let shutdown_token = dispatcher.shutdown_token();

            tokio::spawn(async move {
                cancel.cancelled().await;
                if shutdown_token.shutdown().is_err() {
                    warn!("Telegram dispatcher was not running at shutdown");
                }
            });

            dispatcher.dispatch().await;
            debug!("Telegram dispatcher exited");
        });

        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.cancel_token.cancel();
        Ok(())
    }

    async fn send_text(&self, recipient: &Recipient, text: &str) -> Result<(), TransportError> {
        let chat_id = Self::chat_id(recipient)?;
        self.bot
            .send_message(chat_id, text)
            .await
            .map_err(|e| TransportError::SendFailed {
                recipient: recipient.to_string(),
                details: e.to_string(),
            })?;
        Ok(())
    }

    async fn send_media(
        &self,
        recipient: &Recipient,
        media: &MediaPayload,
    ) -> Result<(), TransportError> {
        let chat_id = Self::chat_id(recipient)?;
        let photo = InputFile::memory(media.bytes.clone()).file_name(media.file_name.clone());

        let mut request = self.bot.send_photo(chat_id, photo);
        if let Some(caption) = &media.caption {
            request = request.caption(caption.clone());
        }

        request.await.map_err(|e| TransportError::SendFailed {
            recipient: recipient.to_string(),
            details: e.to_string(),
        })?;
        Ok(())
    }
}
