// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool execution and the tool-call gate consulted by the completion port.

use async_trait::async_trait;

use crate::error::ValetError;
use crate::types::ToolDecision;

/// Pass/fail gate evaluated per tool name and per argument value before the
/// completion port executes any tool the model requests.
pub trait ToolGate: Send + Sync + 'static {
    fn check(&self, tool_name: &str, args: &serde_json::Value) -> ToolDecision;
}

/// A gate that allows every tool call. The default when no policy is wired.
pub struct AllowAllGate;

impl ToolGate for AllowAllGate {
    fn check(&self, _tool_name: &str, _args: &serde_json::Value) -> ToolDecision {
        ToolDecision::Allow
    }
}

/// A named tool the completion port can advertise to the model and execute
/// on request.
#[async_trait]
pub trait Tool: Send + Sync + 'static {
    /// Tool name as advertised to the model.
    fn name(&self) -> &str;

    /// Human-readable description the model sees.
    fn description(&self) -> &str;

    /// JSON schema for the tool's arguments.
    fn input_schema(&self) -> serde_json::Value;

    /// Runs the tool. The returned string is fed back to the model as the
    /// tool result.
    async fn execute(&self, args: serde_json::Value) -> Result<String, ValetError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_all_gate_allows_everything() {
        let gate = AllowAllGate;
        assert_eq!(
            gate.check("anything", &serde_json::json!({"x": 1})),
            ToolDecision::Allow
        );
    }
}
