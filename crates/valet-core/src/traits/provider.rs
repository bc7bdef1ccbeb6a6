// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Completion port for LLM provider integrations.

use async_trait::async_trait;

use crate::error::ValetError;
use crate::traits::adapter::Adapter;
use crate::types::Turn;

/// Turns an ordered turn sequence into a single text reply.
///
/// The provider runs the model's tool-call sub-protocol internally: before
/// executing any requested tool it consults the [`ToolGate`] it was
/// constructed with, and on a deny substitutes the reason for the tool's
/// result without running it. Callers only ever see the net text.
///
/// [`ToolGate`]: crate::traits::tool::ToolGate
#[async_trait]
pub trait ProviderAdapter: Adapter {
    async fn complete(&self, turns: &[Turn], max_tokens: u32) -> Result<String, ValetError>;
}
