// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Port trait definitions bounding the Valet core.
//!
//! All adapters extend the [`Adapter`] base trait and use `#[async_trait]`
//! for dynamic dispatch compatibility.

pub mod adapter;
pub mod channel;
pub mod memory;
pub mod provider;
pub mod storage;
pub mod tool;

pub use adapter::Adapter;
pub use channel::ChannelAdapter;
pub use memory::MemoryAdapter;
pub use provider::ProviderAdapter;
pub use storage::StorageAdapter;
pub use tool::{AllowAllGate, Tool, ToolGate};
