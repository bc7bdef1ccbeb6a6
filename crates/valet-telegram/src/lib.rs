// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram channel adapter for the Valet assistant.
//!
//! Implements [`ChannelAdapter`] over the Telegram Bot API via teloxide:
//! long polling, allow-list authorization, DM and group handling, and
//! outbound text chunked to the platform limit.

pub mod handler;

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ChatId, MessageId, Recipient, ReplyParameters};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use valet_config::TelegramConfig;
use valet_core::{Adapter, AdapterType, ChannelAdapter, InboundMessage, ValetError};

/// Telegram channel adapter implementing [`ChannelAdapter`].
///
/// Connects via long polling, filters messages by the allow-list, and
/// converts each text message into a channel-agnostic [`InboundMessage`]
/// keyed by chat id.
pub struct TelegramChannel {
    bot: Bot,
    config: TelegramConfig,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<InboundMessage>>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    polling_handle: Option<tokio::task::JoinHandle<()>>,
}

impl TelegramChannel {
    /// Creates a new Telegram channel adapter.
    ///
    /// Requires `config.bot_token` to be set.
    pub fn new(config: TelegramConfig) -> Result<Self, ValetError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            ValetError::Config("telegram.bot_token is required for the Telegram adapter".into())
        })?;
        if token.is_empty() {
            return Err(ValetError::Config("telegram.bot_token cannot be empty".into()));
        }

        let bot = Bot::new(token);
        let (inbound_tx, inbound_rx) = mpsc::channel(100);

        Ok(Self {
            bot,
            config,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            inbound_tx,
            polling_handle: None,
        })
    }

    fn parse_chat_id(conversation_key: &str) -> Result<ChatId, ValetError> {
        conversation_key
            .parse::<i64>()
            .map(ChatId)
            .map_err(|e| ValetError::Channel {
                message: format!("invalid conversation key '{conversation_key}': {e}"),
                source: None,
            })
    }
}

#[async_trait]
impl Adapter for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn shutdown(&self) -> Result<(), ValetError> {
        debug!("Telegram channel shutting down");
        if let Some(handle) = &self.polling_handle {
            handle.abort();
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for TelegramChannel {
    async fn connect(&mut self) -> Result<(), ValetError> {
        if self.polling_handle.is_some() {
            return Ok(());
        }

        let bot = self.bot.clone();
        let tx = self.inbound_tx.clone();
        let allowed_users: Arc<Vec<String>> = Arc::new(self.config.allowed_users.clone());

        info!("starting Telegram long polling");

        let handle = tokio::spawn(async move {
            let dispatch = Update::filter_message().endpoint(move |msg: Message| {
                let tx = tx.clone();
                let allowed = allowed_users.clone();
                async move {
                    if !handler::is_authorized(&msg, &allowed) {
                        debug!(chat_id = msg.chat.id.0, "ignoring unauthorized sender");
                        return respond(());
                    }

                    let Some(text) = msg.text() else {
                        debug!(msg_id = msg.id.0, "ignoring non-text message");
                        return respond(());
                    };

                    let inbound = handler::to_inbound_message(&msg, text);
                    if tx.send(inbound).await.is_err() {
                        warn!("inbound channel closed, dropping message");
                    }
                    respond(())
                }
            });

            Dispatcher::builder(bot, dispatch)
                .default_handler(|_| async {}) // Silently ignore non-message updates
                .build()
                .dispatch()
                .await;
        });

        self.polling_handle = Some(handle);
        Ok(())
    }

    async fn receive(&self) -> Result<InboundMessage, ValetError> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await.ok_or_else(|| ValetError::Channel {
            message: "Telegram inbound channel closed".into(),
            source: None,
        })
    }

    async fn send_text(
        &self,
        conversation_key: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<(), ValetError> {
        let chat_id = Self::parse_chat_id(conversation_key)?;
        let reply_id = reply_to.and_then(|id| id.parse::<i32>().ok().map(MessageId));

        let chunks = handler::chunk_text(text, handler::MAX_MESSAGE_LEN);
        for (i, chunk) in chunks.iter().enumerate() {
            let mut request = self.bot.send_message(Recipient::Id(chat_id), chunk);
            // Only the first chunk threads onto the original message.
            if i == 0 {
                if let Some(id) = reply_id {
                    request = request.reply_parameters(ReplyParameters::new(id));
                }
            }
            request.await.map_err(|e| ValetError::Channel {
                message: format!("failed to send message: {e}"),
                source: Some(Box::new(e)),
            })?;
        }
        Ok(())
    }

    async fn send_typing(&self, conversation_key: &str) -> Result<(), ValetError> {
        let chat_id = Self::parse_chat_id(conversation_key)?;
        self.bot
            .send_chat_action(chat_id, ChatAction::Typing)
            .await
            .map_err(|e| ValetError::Channel {
                message: format!("failed to send typing indicator: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(())
    }
}
