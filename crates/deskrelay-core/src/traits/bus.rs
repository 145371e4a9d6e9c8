// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publish/subscribe bus trait carrying notification events across processes.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::RelayError;
use crate::traits::adapter::RelayAdapter;
use crate::types::BusEvent;

/// Process-independent broadcast channel for newly created notifications.
///
/// Each server process subscribes once at startup. Delivery is
/// at-least-once and unordered relative to the originating database write;
/// subscribers recompute unread counts instead of trusting event ordering.
#[async_trait]
pub trait NotificationBus: RelayAdapter {
    /// Publishes an event to every subscribing process, including this one.
    async fn publish(&self, event: BusEvent) -> Result<(), RelayError>;

    /// Returns a receiver for events published by any process.
    fn subscribe(&self) -> broadcast::Receiver<BusEvent>;
}
