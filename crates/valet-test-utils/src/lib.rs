// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Valet integration tests.
//!
//! Provides mock adapters for fast, deterministic, CI-runnable tests
//! without external services.
//!
//! # Components
//!
//! - [`MockProvider`] - completion port with a queued-response script
//! - [`MockChannel`] - channel with message injection and send capture
//! - [`MockMemory`] - memory port with configurable recall results
//! - [`MemStorage`] - in-memory storage port, no SQLite required

pub mod mem_storage;
pub mod mock_channel;
pub mod mock_memory;
pub mod mock_provider;

pub use mem_storage::MemStorage;
pub use mock_channel::{MockChannel, SentMessage};
pub use mock_memory::MockMemory;
pub use mock_provider::MockProvider;
