// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP handlers for the gateway's internal REST API.
//!
//! `POST /v1/emit` pushes a UI-refresh event into rooms; the
//! `/v1/notifications` routes expose creation, listing, acknowledgement,
//! and administrative delete for producers that sit outside the engine
//! process (helpdesk backend, cron jobs, support tooling).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use deskrelay_core::{rooms, DeliveryChannel, Notification, NotificationKind, RelayError};
use deskrelay_notify::CreateNotification;
use deskrelay_storage::queries::notifications::NotificationFilter;

use crate::server::GatewayState;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(e: RelayError) -> Response {
    let status = match &e {
        RelayError::Validation(_) => StatusCode::BAD_REQUEST,
        RelayError::Unauthorized(_) => StatusCode::FORBIDDEN,
        RelayError::NotFound(_) => StatusCode::NOT_FOUND,
        RelayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

/// GET /health (unauthenticated, for load balancers and systemd).
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

pub async fn get_public_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    })
}

/// POST /v1/emit request body.
#[derive(Debug, Deserialize)]
pub struct EmitRequest {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub rooms: Vec<String>,
}

fn valid_room(room: &str) -> bool {
    room == rooms::AGENTS
        || room == rooms::ADMINS
        || room
            .strip_prefix("user:")
            .is_some_and(|id| !id.is_empty())
}

/// POST /v1/emit
///
/// Generic event emission: `{event, data, rooms[]}` where each room is
/// `agents`, `admins`, or `user:<id>`. Reaches every process via the bus.
pub async fn post_emit(
    State(state): State<GatewayState>,
    Json(body): Json<EmitRequest>,
) -> Response {
    if body.event.trim().is_empty() {
        return error_response(RelayError::Validation("event must not be empty".into()));
    }
    if body.rooms.is_empty() {
        return error_response(RelayError::Validation("rooms must not be empty".into()));
    }
    if let Some(bad) = body.rooms.iter().find(|r| !valid_room(r)) {
        return error_response(RelayError::Validation(format!("invalid room {bad}")));
    }

    match state.service.emit(&body.event, body.data, body.rooms).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /v1/notifications request body.
#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub user_id: String,
    #[serde(default)]
    pub related_id: Option<String>,
    #[serde(default)]
    pub actor_id: Option<String>,
    /// Explicit channel override; omitted means "ask the router".
    #[serde(default)]
    pub channels: Option<Vec<DeliveryChannel>>,
}

/// POST /v1/notifications
pub async fn post_notifications(
    State(state): State<GatewayState>,
    Json(body): Json<CreateRequest>,
) -> Response {
    let mut input = CreateNotification::new(body.kind, &body.title, &body.body, &body.user_id);
    input.related_id = body.related_id;
    input.actor_id = body.actor_id;
    input.channels = body.channels.map(|list| list.into_iter().collect());

    match state.service.create(input).await {
        Ok(notification) => (StatusCode::CREATED, Json(notification)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Query parameters for GET /v1/notifications.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user_id: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub unread_only: bool,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

/// One page of a feed.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub items: Vec<Notification>,
    pub total: i64,
    pub unread: i64,
    pub page: u32,
    pub page_size: u32,
}

/// GET /v1/notifications
pub async fn get_notifications(
    State(state): State<GatewayState>,
    Query(query): Query<ListQuery>,
) -> Response {
    let filter = NotificationFilter {
        kind: None,
        unread_only: query.unread_only,
    };
    match state
        .service
        .list(&query.user_id, query.page, query.page_size, &filter)
        .await
    {
        Ok(page) => Json(ListResponse {
            items: page.items,
            total: page.total,
            unread: page.unread,
            page: page.page,
            page_size: page.page_size,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// Body for acknowledgement routes: who is acting.
#[derive(Debug, Deserialize)]
pub struct ActorBody {
    pub user_id: String,
}

/// POST /v1/notifications/{id}/read
pub async fn post_read(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<ActorBody>,
) -> Response {
    match state.service.mark_as_read(&id, &body.user_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /v1/notifications/read-all response body.
#[derive(Debug, Serialize)]
pub struct ReadAllResponse {
    pub marked: u64,
}

/// POST /v1/notifications/read-all
pub async fn post_read_all(
    State(state): State<GatewayState>,
    Json(body): Json<ActorBody>,
) -> Response {
    match state
        .service
        .mark_all_read(&body.user_id, &NotificationFilter::default())
        .await
    {
        Ok(marked) => Json(ReadAllResponse { marked }).into_response(),
        Err(e) => error_response(e),
    }
}

/// Query parameter for DELETE: the requesting administrator.
#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub user_id: String,
}

/// DELETE /v1/notifications/{id}
pub async fn delete_notification(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Response {
    match state.service.delete(&id, &query.user_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}
