// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Valet personal assistant.
//!
//! This crate provides the port trait definitions, error types, and common
//! types used throughout the Valet workspace. The concurrency core in
//! `valet-agent` is bounded by the four ports defined here: channel
//! (transport), provider (completion), memory (semantic recall), and
//! storage (conversation store).

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ValetError;
pub use types::{
    AdapterType, InboundMessage, MessageStatus, PersistedMessage, Role, ScheduledTask,
    ToolDecision, Turn,
};

pub use traits::{
    Adapter, AllowAllGate, ChannelAdapter, MemoryAdapter, ProviderAdapter, StorageAdapter,
    Tool, ToolGate,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valet_error_has_all_variants() {
        let _config = ValetError::Config("test".into());
        let _storage = ValetError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _channel = ValetError::Channel {
            message: "test".into(),
            source: None,
        };
        let _provider = ValetError::Provider {
            message: "test".into(),
            source: None,
        };
        let _memory = ValetError::Memory("test".into());
        let _timeout = ValetError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _cancelled = ValetError::Cancelled;
        let _internal = ValetError::Internal("test".into());
    }

    #[test]
    fn all_port_traits_are_exported() {
        // If any port module is missing or has a compile error, this test
        // won't compile.
        fn _assert_adapter<T: Adapter>() {}
        fn _assert_channel<T: ChannelAdapter>() {}
        fn _assert_provider<T: ProviderAdapter>() {}
        fn _assert_storage<T: StorageAdapter>() {}
        fn _assert_memory<T: MemoryAdapter>() {}
        fn _assert_tool<T: Tool>() {}
        fn _assert_gate<T: ToolGate>() {}
    }

    #[test]
    fn adapter_type_has_four_variants() {
        use std::str::FromStr;

        let variants = [
            AdapterType::Channel,
            AdapterType::Provider,
            AdapterType::Storage,
            AdapterType::Memory,
        ];
        for variant in &variants {
            let s = variant.to_string();
            assert_eq!(AdapterType::from_str(&s).unwrap(), *variant);
        }
    }
}
