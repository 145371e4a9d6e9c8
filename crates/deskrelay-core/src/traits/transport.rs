// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel transport trait for external delivery media (email, push, social).

use async_trait::async_trait;

use crate::error::RelayError;
use crate::traits::adapter::RelayAdapter;
use crate::types::{DeliveryChannel, JobPayload, TransportReceipt};

/// One external delivery medium.
///
/// Workers call `deliver` once per job attempt. Transports must be safe to
/// call concurrently from a bounded worker pool and must not share mutable
/// state between attempts.
#[async_trait]
pub trait Transport: RelayAdapter {
    /// The channel this transport serves.
    fn channel(&self) -> DeliveryChannel;

    /// Delivers one rendered payload to the external medium.
    ///
    /// A returned error marks the attempt failed; the worker applies the
    /// retry policy. The receipt's `message_id` is recorded in the delivery
    /// log (and drives email threading).
    async fn deliver(&self, payload: &JobPayload) -> Result<TransportReceipt, RelayError>;
}
