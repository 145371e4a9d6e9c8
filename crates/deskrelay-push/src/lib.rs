// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device push transport for the deskrelay notification engine.
//!
//! Delivers one job to every active push subscription the user has
//! registered. Endpoints that answer 404 or 410 are gone for good; they
//! are deactivated through the [`Directory`] so later notifications stop
//! retrying dead devices.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use deskrelay_config::model::PushConfig;
use deskrelay_core::{
    AdapterType, DeliveryChannel, Directory, HealthStatus, JobPayload, RelayAdapter, RelayError,
    Transport, TransportReceipt,
};

/// HTTP push transport.
pub struct PushTransport {
    client: reqwest::Client,
    directory: Arc<dyn Directory>,
}

impl PushTransport {
    pub fn new(config: &PushConfig, directory: Arc<dyn Directory>) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RelayError::Config(format!("failed to build push client: {e}")))?;
        Ok(Self { client, directory })
    }
}

#[async_trait]
impl RelayAdapter for PushTransport {
    fn name(&self) -> &str {
        "push"
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
impl Transport for PushTransport {
    fn channel(&self) -> DeliveryChannel {
        DeliveryChannel::Push
    }

    async fn deliver(&self, payload: &JobPayload) -> Result<TransportReceipt, RelayError> {
        let subscriptions = self.directory.push_subscriptions(&payload.user_id).await?;
        if subscriptions.is_empty() {
            return Err(RelayError::transport(
                "push",
                format!("user {} has no active push subscriptions", payload.user_id),
            ));
        }

        let body = serde_json::json!({
            "notification_id": payload.notification_id,
            "title": payload.title,
            "body": payload.body,
            "link": payload.link,
        });

        let mut delivered = 0usize;
        let mut last_error: Option<String> = None;
        for subscription in &subscriptions {
            match self.client.post(&subscription.endpoint).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    delivered += 1;
                }
                Ok(response)
                    if response.status() == reqwest::StatusCode::NOT_FOUND
                        || response.status() == reqwest::StatusCode::GONE =>
                {
                    // Dead endpoint; stop retrying it for future sends.
                    debug!(
                        subscription_id = %subscription.id,
                        status = %response.status(),
                        "push endpoint gone, deactivating subscription"
                    );
                    if let Err(e) = self
                        .directory
                        .deactivate_push_subscription(&subscription.id)
                        .await
                    {
                        warn!(
                            subscription_id = %subscription.id,
                            error = %e,
                            "failed to deactivate dead subscription"
                        );
                    }
                    last_error = Some(format!(
                        "endpoint gone ({})",
                        response.status()
                    ));
                }
                Ok(response) => {
                    last_error = Some(format!("push endpoint answered {}", response.status()));
                }
                Err(e) => {
                    last_error = Some(format!("push request failed: {e}"));
                }
            }
        }

        if delivered == 0 {
            return Err(RelayError::transport(
                "push",
                last_error.unwrap_or_else(|| "no endpoint accepted the push".into()),
            ));
        }
        debug!(
            notification_id = %payload.notification_id,
            delivered,
            total = subscriptions.len(),
            "push delivered"
        );
        Ok(TransportReceipt { message_id: None })
    }
}
