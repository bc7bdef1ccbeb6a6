// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Proactive task scheduling for the Valet assistant.
//!
//! Tasks carry a 5-field cron expression and a free-text description. The
//! [`Scheduler`] evaluates them each tick and routes due executions through
//! the same serializer as inbound messages; the tools in [`tools`] let the
//! model manage tasks from inside a conversation.

pub mod expr;
pub mod scheduler;
pub mod tools;

pub use expr::{CronExpr, CronParseError};
pub use scheduler::Scheduler;
pub use tools::{CancelTaskTool, ListTasksTool, ScheduleTaskTool};
