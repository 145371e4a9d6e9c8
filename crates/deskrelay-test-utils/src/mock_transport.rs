// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel transport for deterministic testing.
//!
//! `MockTransport` implements `Transport` with a scripted outcome queue and
//! captured deliveries for assertion in tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use deskrelay_core::{
    AdapterType, DeliveryChannel, HealthStatus, JobPayload, RelayAdapter, RelayError, Transport,
    TransportReceipt,
};

/// A mock delivery transport.
///
/// Outcomes are consumed front-to-back from the scripted queue; once the
/// queue is empty every delivery succeeds with a deterministic message id.
pub struct MockTransport {
    channel: DeliveryChannel,
    scripted: Mutex<VecDeque<Result<TransportReceipt, String>>>,
    delivered: Mutex<Vec<JobPayload>>,
}

impl MockTransport {
    /// A transport for `channel` that always succeeds.
    pub fn succeeding(channel: DeliveryChannel) -> Self {
        Self {
            channel,
            scripted: Mutex::new(VecDeque::new()),
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// A transport that fails the first `n` attempts, then succeeds.
    pub fn failing_first(channel: DeliveryChannel, n: usize) -> Self {
        let transport = Self::succeeding(channel);
        {
            let mut scripted = transport.scripted.lock().unwrap();
            for _ in 0..n {
                scripted.push_back(Err("scripted failure".to_string()));
            }
        }
        transport
    }

    /// Append an explicit outcome to the script.
    pub fn push_outcome(&self, outcome: Result<TransportReceipt, String>) {
        self.scripted.lock().unwrap().push_back(outcome);
    }

    /// Payloads of every successful delivery, in order.
    pub fn delivered(&self) -> Vec<JobPayload> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }
}

#[async_trait]
impl RelayAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn channel(&self) -> DeliveryChannel {
        self.channel
    }

    async fn deliver(&self, payload: &JobPayload) -> Result<TransportReceipt, RelayError> {
        let scripted = self.scripted.lock().unwrap().pop_front();
        match scripted {
            Some(Ok(receipt)) => {
                self.delivered.lock().unwrap().push(payload.clone());
                Ok(receipt)
            }
            Some(Err(message)) => Err(RelayError::transport(self.channel.to_string(), message)),
            None => {
                self.delivered.lock().unwrap().push(payload.clone());
                Ok(TransportReceipt {
                    message_id: Some(format!(
                        "<mock-{}-{}>",
                        payload.notification_id, self.channel
                    )),
                })
            }
        }
    }
}
