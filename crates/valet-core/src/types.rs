// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across port traits and the Valet assistant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Role tag for a single turn in a conversation's working history.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message unit inside a session's working history.
///
/// Turns are immutable once appended; insertion order is chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// An inbound message produced by the transport, consumed exactly once by
/// the message pipeline.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Stable identifier for the logical chat this message belongs to.
    pub conversation_key: String,
    /// Transport-assigned message identifier.
    pub transport_message_id: String,
    pub sender_name: String,
    pub sender_id: String,
    pub text: String,
    /// Whether this message arrived in a group chat rather than a DM.
    pub is_group: bool,
    /// Display name of the group, when `is_group` is set.
    pub group_title: Option<String>,
    /// Arrival timestamp, RFC3339.
    pub received_at: String,
}

/// Processing status of a persisted message. Only this field of a persisted
/// row is ever mutated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Processing,
    Done,
    Error,
}

/// One durable row per turn that was actually sent or received. The system
/// preamble is never persisted.
#[derive(Debug, Clone)]
pub struct PersistedMessage {
    pub id: String,
    pub conversation_key: String,
    pub role: Role,
    pub content: String,
    pub transport_message_id: Option<String>,
    pub sender_name: Option<String>,
    pub sender_id: Option<String>,
    pub status: MessageStatus,
    /// Creation timestamp, RFC3339.
    pub created_at: String,
}

/// A recurring proactive task, fired by the scheduler when its cron
/// expression matches the current minute.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub id: String,
    /// Target conversation for the proactive message.
    pub conversation_key: String,
    /// Free-text description turned into the synthetic prompt.
    pub description: String,
    /// 5-field cron expression (minute hour day-of-month month day-of-week).
    pub cron_expr: String,
    pub active: bool,
    pub last_run: Option<DateTime<Utc>>,
    /// Creation timestamp, RFC3339.
    pub created_at: String,
}

/// Verdict of the tool-call gate, consulted by the completion port before
/// executing any tool the model requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolDecision {
    Allow,
    /// Denied; the reason is substituted for the tool's result without
    /// running it.
    Deny(String),
}

/// Identifies the kind of adapter behind a port.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Provider,
    Storage,
    Memory,
}
