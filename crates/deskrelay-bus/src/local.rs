// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process bus backed by `tokio::sync::broadcast`.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::trace;

use deskrelay_core::{
    AdapterType, BusEvent, HealthStatus, NotificationBus, RelayAdapter, RelayError,
};

const DEFAULT_CAPACITY: usize = 256;

/// Single-process bus. Every subscriber in this process sees every
/// published event, including events published by itself.
pub struct LocalBus {
    sender: broadcast::Sender<BusEvent>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelayAdapter for LocalBus {
    fn name(&self) -> &str {
        "local"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Bus
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl NotificationBus for LocalBus {
    async fn publish(&self, event: BusEvent) -> Result<(), RelayError> {
        // A send error only means no subscriber is currently attached,
        // which is normal during startup and shutdown.
        let delivered = self.sender.send(event).unwrap_or(0);
        trace!(subscribers = delivered, "bus event published");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }
}
