// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport port for messaging platform integrations (Telegram, etc.).

use async_trait::async_trait;

use crate::error::ValetError;
use crate::traits::adapter::Adapter;
use crate::types::InboundMessage;

/// Bidirectional messaging channel.
///
/// The core assumes at most one concurrent logical receive stream per
/// channel and treats send failures as non-fatal per message.
#[async_trait]
pub trait ChannelAdapter: Adapter {
    /// Establishes a connection to the messaging platform.
    async fn connect(&mut self) -> Result<(), ValetError>;

    /// Awaits the next inbound message from the channel.
    async fn receive(&self) -> Result<InboundMessage, ValetError>;

    /// Sends a text reply into the given conversation. The transport owns
    /// chunking to its length limit.
    async fn send_text(
        &self,
        conversation_key: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<(), ValetError>;

    /// Shows a typing indicator in the given conversation, where supported.
    async fn send_typing(&self, conversation_key: &str) -> Result<(), ValetError>;
}
