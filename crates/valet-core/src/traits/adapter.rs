// SPDX-FileCopyrightText: 2026 Valet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base trait that every port adapter must implement.

use async_trait::async_trait;

use crate::error::ValetError;
use crate::types::AdapterType;

/// The base trait for all Valet port adapters.
///
/// Every adapter (channel, provider, storage, memory) implements this trait,
/// which provides identity and lifecycle hooks.
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this adapter.
    fn version(&self) -> semver::Version;

    /// Returns the kind of port this adapter sits behind.
    fn adapter_type(&self) -> AdapterType;

    /// Gracefully shuts down the adapter, releasing any held resources.
    async fn shutdown(&self) -> Result<(), ValetError>;
}
