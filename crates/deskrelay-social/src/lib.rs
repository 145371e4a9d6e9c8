// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Social webhook transport for the deskrelay notification engine.
//!
//! Forwards social-channel jobs to the configured outbound webhook. A job
//! is only enqueued for this channel when the notification carries a
//! social payload (page and post ids), so the transport treats a missing
//! payload as a hard error rather than guessing.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use deskrelay_config::model::SocialConfig;
use deskrelay_core::{
    AdapterType, DeliveryChannel, HealthStatus, JobPayload, RelayAdapter, RelayError, Transport,
    TransportReceipt,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Webhook transport for social replies.
pub struct SocialTransport {
    client: reqwest::Client,
    webhook_url: String,
}

impl SocialTransport {
    /// Returns `None` when no webhook is configured (channel disabled).
    pub fn from_config(config: &SocialConfig) -> Result<Option<Self>, RelayError> {
        let Some(webhook_url) = config.webhook_url.clone() else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RelayError::Config(format!("failed to build social client: {e}")))?;
        Ok(Some(Self {
            client,
            webhook_url,
        }))
    }
}

#[async_trait]
impl RelayAdapter for SocialTransport {
    fn name(&self) -> &str {
        "social-webhook"
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
impl Transport for SocialTransport {
    fn channel(&self) -> DeliveryChannel {
        DeliveryChannel::Social
    }

    async fn deliver(&self, payload: &JobPayload) -> Result<TransportReceipt, RelayError> {
        let social = payload.social.as_ref().ok_or_else(|| {
            RelayError::transport("social", "job carries no social payload")
        })?;

        let body = serde_json::json!({
            "notification_id": payload.notification_id,
            "page_id": social.page_id,
            "post_id": social.post_id,
            "title": payload.title,
            "body": payload.body,
        });
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Transport {
                channel: "social".into(),
                message: format!("webhook request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        if !response.status().is_success() {
            return Err(RelayError::transport(
                "social",
                format!("webhook answered {}", response.status()),
            ));
        }
        debug!(
            notification_id = %payload.notification_id,
            page_id = %social.page_id,
            "social webhook accepted"
        );
        Ok(TransportReceipt { message_id: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use deskrelay_core::SocialPayload;

    async fn serve(status: StatusCode) -> String {
        let app = Router::new().route("/hook", post(move || async move { status }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/hook")
    }

    fn payload(social: Option<SocialPayload>) -> JobPayload {
        JobPayload {
            notification_id: "n-1".into(),
            channel: DeliveryChannel::Social,
            user_id: "u-1".into(),
            recipient: None,
            title: "New comment".into(),
            body: "Someone commented on your post".into(),
            link: None,
            threading: None,
            social,
        }
    }

    fn config(url: Option<String>) -> SocialConfig {
        SocialConfig { webhook_url: url }
    }

    #[test]
    fn missing_webhook_disables_the_channel() {
        let transport = SocialTransport::from_config(&config(None)).unwrap();
        assert!(transport.is_none());
    }

    #[tokio::test]
    async fn delivers_social_payload_to_webhook() {
        let url = serve(StatusCode::OK).await;
        let transport = SocialTransport::from_config(&config(Some(url)))
            .unwrap()
            .unwrap();

        let social = SocialPayload {
            page_id: "page-1".into(),
            post_id: "post-9".into(),
        };
        transport.deliver(&payload(Some(social))).await.unwrap();
    }

    #[tokio::test]
    async fn missing_social_payload_is_a_transport_error() {
        let url = serve(StatusCode::OK).await;
        let transport = SocialTransport::from_config(&config(Some(url)))
            .unwrap()
            .unwrap();

        let err = transport.deliver(&payload(None)).await.unwrap_err();
        assert!(err.to_string().contains("no social payload"));
    }

    #[tokio::test]
    async fn webhook_rejection_is_a_transport_error() {
        let url = serve(StatusCode::BAD_GATEWAY).await;
        let transport = SocialTransport::from_config(&config(Some(url)))
            .unwrap()
            .unwrap();

        let social = SocialPayload {
            page_id: "page-1".into(),
            post_id: "post-9".into(),
        };
        let err = transport.deliver(&payload(Some(social))).await.unwrap_err();
        assert!(err.to_string().contains("502"));
    }
}
