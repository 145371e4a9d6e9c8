// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket realtime gateway.
//!
//! Authenticated WebSocket connections join rooms (`user:<id>`, `agents`,
//! `admins`) and receive live notification events; a bearer-authenticated
//! REST surface lets outside producers create notifications and push
//! UI-refresh events. The gateway's [`RoomRegistry`] implements
//! [`LivePush`](deskrelay_core::LivePush), so the bus subscriber loop
//! delivers into the same registry the sockets read from.

pub mod auth;
pub mod handlers;
pub mod rooms;
pub mod server;
pub mod ws;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use deskrelay_core::{AdapterType, HealthStatus, RelayAdapter, RelayError, TokenVerifier};
use deskrelay_notify::NotificationService;

use crate::auth::{AuthConfig, HmacTokenVerifier};
use crate::rooms::RoomRegistry;
use crate::server::{GatewayState, HealthState, ServerConfig};

/// Gateway configuration.
///
/// Mirrors `GatewayConfig` from `deskrelay-config` to avoid a dependency
/// on the config crate from the gateway crate.
#[derive(Clone)]
pub struct GatewayListenConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Bearer token for the internal REST API. `None` disables it.
    pub bearer_token: Option<String>,
    /// Secret for HMAC identity tokens at the WS handshake. `None`
    /// rejects every connection.
    pub token_secret: Option<String>,
}

impl std::fmt::Debug for GatewayListenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayListenConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "token_secret",
                &self.token_secret.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

/// The realtime gateway adapter.
///
/// Runs the axum server as a background task started by [`start`]. The
/// room registry is shared with the bus subscriber loop, which pushes
/// into it from the other side.
///
/// [`start`]: RelayGateway::start
pub struct RelayGateway {
    config: GatewayListenConfig,
    registry: Arc<RoomRegistry>,
    service: Arc<NotificationService>,
    verifier: Arc<dyn TokenVerifier>,
    server_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl RelayGateway {
    pub fn new(config: GatewayListenConfig, service: Arc<NotificationService>) -> Self {
        let verifier = Arc::new(HmacTokenVerifier::new(config.token_secret.as_deref()));
        Self {
            config,
            registry: Arc::new(RoomRegistry::new()),
            service,
            verifier,
            server_handle: Mutex::new(None),
        }
    }

    /// The live-delivery sink owned by this gateway. Handed to the bus
    /// subscriber loop.
    pub fn registry(&self) -> Arc<RoomRegistry> {
        Arc::clone(&self.registry)
    }

    /// Binds the server and runs it in the background.
    pub async fn start(&self) -> Result<(), RelayError> {
        let server_config = ServerConfig {
            host: self.config.host.clone(),
            port: self.config.port,
        };
        let state = GatewayState {
            service: Arc::clone(&self.service),
            registry: Arc::clone(&self.registry),
            verifier: Arc::clone(&self.verifier),
            auth: AuthConfig {
                bearer_token: self.config.bearer_token.clone(),
            },
            health: HealthState {
                start_time: std::time::Instant::now(),
            },
        };

        let handle = tokio::spawn(async move {
            if let Err(e) = server::start_server(&server_config, state).await {
                tracing::error!("gateway server error: {e}");
            }
        });

        let mut server_handle = self.server_handle.lock().await;
        *server_handle = Some(handle);

        tracing::info!(
            "gateway started on {}:{}",
            self.config.host,
            self.config.port
        );
        Ok(())
    }
}

#[async_trait]
impl RelayAdapter for RelayGateway {
    fn name(&self) -> &str {
        "gateway"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Gateway
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        let handle = self.server_handle.lock().await;
        match handle.as_ref() {
            Some(h) if !h.is_finished() => Ok(HealthStatus::Healthy),
            Some(_) => Ok(HealthStatus::Unhealthy("server task exited".to_string())),
            None => Ok(HealthStatus::Unhealthy("server not started".to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        let mut handle = self.server_handle.lock().await;
        if let Some(h) = handle.take() {
            h.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskrelay_config::model::RelayConfig;

    async fn test_gateway() -> (RelayGateway, deskrelay_test_utils::TestDb) {
        let harness = deskrelay_test_utils::TestDb::new().await.unwrap();
        let bus = Arc::new(deskrelay_bus::LocalBus::new());
        let directory = Arc::new(deskrelay_test_utils::StaticDirectory::new());
        let service = Arc::new(NotificationService::new(
            harness.db.clone(),
            bus,
            directory,
            &RelayConfig::default(),
        ));
        let config = GatewayListenConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            bearer_token: None,
            token_secret: None,
        };
        (RelayGateway::new(config, service), harness)
    }

    #[tokio::test]
    async fn gateway_adapter_identity() {
        let (gateway, _harness) = test_gateway().await;
        assert_eq!(gateway.name(), "gateway");
        assert_eq!(gateway.adapter_type(), AdapterType::Gateway);
        assert_eq!(gateway.version(), semver::Version::new(0, 1, 0));
    }

    #[tokio::test]
    async fn health_check_before_start_is_unhealthy() {
        let (gateway, _harness) = test_gateway().await;
        match gateway.health_check().await.unwrap() {
            HealthStatus::Unhealthy(msg) => assert!(msg.contains("not started")),
            other => panic!("expected Unhealthy, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn start_then_shutdown_flips_health() {
        let (gateway, _harness) = test_gateway().await;
        gateway.start().await.unwrap();
        assert_eq!(gateway.health_check().await.unwrap(), HealthStatus::Healthy);

        gateway.shutdown().await.unwrap();
        match gateway.health_check().await.unwrap() {
            HealthStatus::Unhealthy(_) => {}
            other => panic!("expected Unhealthy after shutdown, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn config_debug_redacts_secrets() {
        let config = GatewayListenConfig {
            host: "127.0.0.1".to_string(),
            port: 7470,
            bearer_token: Some("api-secret".to_string()),
            token_secret: Some("hmac-secret".to_string()),
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("api-secret"));
        assert!(!debug.contains("hmac-secret"));
    }
}
