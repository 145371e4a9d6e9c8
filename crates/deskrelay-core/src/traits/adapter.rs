// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait that every long-lived engine component implements.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::types::{AdapterType, HealthStatus};

/// The base trait for deskrelay adapters (storage, bus, transports, gateway).
///
/// Provides identity, health checks, and an explicit shutdown hook so
/// process-wide singletons are connected once at startup and released on
/// the shutdown signal rather than through implicit global state.
#[async_trait]
pub trait RelayAdapter: Send + Sync + 'static {
    /// Human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Semantic version of this adapter.
    fn version(&self) -> semver::Version;

    /// The type of adapter (storage, bus, transport, gateway).
    fn adapter_type(&self) -> AdapterType;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, RelayError>;

    /// Gracefully shuts down the adapter, releasing any held resources.
    async fn shutdown(&self) -> Result<(), RelayError>;
}
