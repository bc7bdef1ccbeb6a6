// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic completion provider for the Valet assistant.
//!
//! Implements [`ProviderAdapter`] over the non-streaming Messages API.
//! The model's tool-call sub-protocol runs entirely inside
//! [`AnthropicProvider::complete`]: requested tools are checked against
//! the [`ToolGate`], executed, and their results fed back until the model
//! stops with plain text.

pub mod client;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use valet_config::ProviderConfig;
use valet_core::{
    Adapter, AdapterType, ProviderAdapter, Role, Tool, ToolDecision, ToolGate, Turn, ValetError,
};

pub use client::AnthropicClient;
use types::{
    ApiContent, ApiContentBlock, ApiMessage, MessageRequest, ResponseContentBlock, ToolDefinition,
};

/// Upper bound on tool-call round trips within one `complete` call.
const MAX_TOOL_ROUNDS: usize = 8;

/// Completion provider backed by the Anthropic Messages API.
pub struct AnthropicProvider {
    client: AnthropicClient,
    tools: Vec<Arc<dyn Tool>>,
    gate: Arc<dyn ToolGate>,
}

impl AnthropicProvider {
    /// Builds a provider from configuration. The API key comes from the
    /// config or the `ANTHROPIC_API_KEY` environment variable.
    pub fn from_config(
        config: &ProviderConfig,
        tools: Vec<Arc<dyn Tool>>,
        gate: Arc<dyn ToolGate>,
    ) -> Result<Self, ValetError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| {
                ValetError::Config(
                    "provider.api_key or ANTHROPIC_API_KEY is required".into(),
                )
            })?;
        let client = AnthropicClient::new(
            api_key,
            config.api_version.clone(),
            config.default_model.clone(),
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Self::new(client, tools, gate))
    }

    pub fn new(client: AnthropicClient, tools: Vec<Arc<dyn Tool>>, gate: Arc<dyn ToolGate>) -> Self {
        Self {
            client,
            tools,
            gate,
        }
    }

    fn tool_definitions(&self) -> Option<Vec<ToolDefinition>> {
        if self.tools.is_empty() {
            return None;
        }
        Some(
            self.tools
                .iter()
                .map(|t| ToolDefinition {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    input_schema: t.input_schema(),
                })
                .collect(),
        )
    }

    /// Gates and executes one requested tool. The returned string always
    /// goes back to the model; `is_error` marks denials and failures.
    async fn run_tool(&self, name: &str, input: &serde_json::Value) -> (String, Option<bool>) {
        match self.gate.check(name, input) {
            ToolDecision::Deny(reason) => {
                warn!(tool = %name, %reason, "tool call denied");
                return (format!("Tool call denied: {reason}"), Some(true));
            }
            ToolDecision::Allow => {}
        }

        let Some(tool) = self.tools.iter().find(|t| t.name() == name) else {
            warn!(tool = %name, "model requested unknown tool");
            return (format!("Unknown tool: {name}"), Some(true));
        };

        match tool.execute(input.clone()).await {
            Ok(result) => {
                debug!(tool = %name, "tool executed");
                (result, None)
            }
            Err(e) => {
                warn!(tool = %name, error = %e, "tool execution failed");
                (format!("Tool failed: {e}"), Some(true))
            }
        }
    }
}

#[async_trait]
impl Adapter for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn shutdown(&self) -> Result<(), ValetError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    async fn complete(&self, turns: &[Turn], max_tokens: u32) -> Result<String, ValetError> {
        let (system, mut messages) = convert_turns(turns);
        let tools = self.tool_definitions();

        for _ in 0..MAX_TOOL_ROUNDS {
            let request = MessageRequest {
                model: self.client.default_model().to_string(),
                messages: messages.clone(),
                system: system.clone(),
                max_tokens,
                tools: tools.clone(),
            };
            let response = self.client.complete_message(&request).await?;

            if response.stop_reason.as_deref() != Some("tool_use") {
                let text: String = response
                    .content
                    .iter()
                    .filter_map(|block| match block {
                        ResponseContentBlock::Text { text } => Some(text.as_str()),
                        ResponseContentBlock::ToolUse { .. } => None,
                    })
                    .collect();
                return Ok(text);
            }

            let mut assistant_blocks = Vec::new();
            let mut results = Vec::new();
            for block in &response.content {
                match block {
                    ResponseContentBlock::Text { text } => {
                        assistant_blocks.push(ApiContentBlock::Text { text: text.clone() });
                    }
                    ResponseContentBlock::ToolUse { id, name, input } => {
                        assistant_blocks.push(ApiContentBlock::ToolUse {
                            id: id.clone(),
                            name: name.clone(),
                            input: input.clone(),
                        });
                        let (content, is_error) = self.run_tool(name, input).await;
                        results.push(ApiContentBlock::ToolResult {
                            tool_use_id: id.clone(),
                            content,
                            is_error,
                        });
                    }
                }
            }

            if results.is_empty() {
                return Err(ValetError::Provider {
                    message: "tool_use stop reason without a tool_use block".into(),
                    source: None,
                });
            }
            messages.push(ApiMessage {
                role: "assistant".into(),
                content: ApiContent::Blocks(assistant_blocks),
            });
            messages.push(ApiMessage {
                role: "user".into(),
                content: ApiContent::Blocks(results),
            });
        }

        Err(ValetError::Provider {
            message: format!("model did not settle within {MAX_TOOL_ROUNDS} tool rounds"),
            source: None,
        })
    }
}

/// Splits turns into the API's system string and alternating messages.
/// System turns (preamble, injected memory) join the system string;
/// consecutive same-role turns are merged, as the API requires strict
/// user/assistant alternation.
fn convert_turns(turns: &[Turn]) -> (Option<String>, Vec<ApiMessage>) {
    let mut system_parts = Vec::new();
    let mut messages: Vec<ApiMessage> = Vec::new();

    for turn in turns {
        let role = match turn.role {
            Role::System => {
                system_parts.push(turn.content.clone());
                continue;
            }
            Role::User => "user",
            Role::Assistant => "assistant",
        };

        match messages.last_mut() {
            Some(last) if last.role == role => {
                if let ApiContent::Text(existing) = &mut last.content {
                    existing.push_str("\n\n");
                    existing.push_str(&turn.content);
                }
            }
            _ => messages.push(ApiMessage {
                role: role.into(),
                content: ApiContent::Text(turn.content.clone()),
            }),
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    (system, messages)
}
