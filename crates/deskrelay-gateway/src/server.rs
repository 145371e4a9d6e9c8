// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state.

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use deskrelay_core::{RelayError, TokenVerifier};
use deskrelay_notify::NotificationService;

use crate::auth::{auth_middleware, AuthConfig};
use crate::handlers;
use crate::rooms::RoomRegistry;
use crate::ws;

/// Health state for the unauthenticated health endpoint.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// The orchestrator behind every mutating route.
    pub service: Arc<NotificationService>,
    /// Live connection registry; the process-local LivePush sink.
    pub registry: Arc<RoomRegistry>,
    /// Identity-token verifier for the WebSocket handshake.
    pub verifier: Arc<dyn TokenVerifier>,
    /// Bearer auth for the `/v1` routes.
    pub auth: AuthConfig,
    /// Health state for unauthenticated endpoints.
    pub health: HealthState,
}

/// Gateway server listen configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

/// Start the gateway HTTP/WebSocket server.
///
/// Serves:
/// - GET /health (public)
/// - POST /v1/emit (bearer auth)
/// - POST /v1/notifications, GET /v1/notifications (bearer auth)
/// - POST /v1/notifications/{id}/read, POST /v1/notifications/read-all (bearer auth)
/// - DELETE /v1/notifications/{id} (bearer auth)
/// - GET /ws (identity-token auth during handshake, not middleware)
pub async fn start_server(config: &ServerConfig, state: GatewayState) -> Result<(), RelayError> {
    let auth_state = state.auth.clone();

    // Unauthenticated public route for load balancers and systemd.
    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/emit", post(handlers::post_emit))
        .route(
            "/v1/notifications",
            post(handlers::post_notifications).get(handlers::get_notifications),
        )
        .route("/v1/notifications/read-all", post(handlers::post_read_all))
        .route("/v1/notifications/{id}/read", post(handlers::post_read))
        .route(
            "/v1/notifications/{id}",
            delete(handlers::delete_notification),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state.clone());

    // WebSocket route; auth happens during the handshake.
    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayError::Config(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| RelayError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}
