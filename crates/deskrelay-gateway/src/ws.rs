// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket handler for live notification delivery.
//!
//! Handshake: `GET /ws?token=<identity token>`. The token is verified
//! before the upgrade; the resolved identity decides room membership
//! (`user:<id>` always, `agents` for agents and admins, `admins` for
//! admins).
//!
//! Server -> Client (JSON):
//! ```json
//! {"event": "notification:new", "data": { ...notification... }}
//! {"event": "notification:unread-count", "data": 3}
//! ```
//!
//! Client -> Server (JSON):
//! ```json
//! {"event": "notification:read", "id": "notif-1"}
//! {"event": "notification:mark-all-read"}
//! ```

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use deskrelay_core::Identity;
use deskrelay_storage::queries::notifications::NotificationFilter;

use crate::server::GatewayState;

/// Inbound client frames.
pub mod client_events {
    /// Acknowledge one notification; carries an `id` field.
    pub const READ: &str = "notification:read";
    /// Acknowledge the whole feed.
    pub const MARK_ALL_READ: &str = "notification:mark-all-read";
}

/// Handshake query parameters.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    token: Option<String>,
}

/// Client frame: an event name plus an optional notification id.
#[derive(Debug, Deserialize)]
struct WsIncoming {
    event: String,
    #[serde(default)]
    id: Option<String>,
}

/// WebSocket upgrade handler.
///
/// The identity token is checked before the protocol upgrade so an
/// unauthenticated caller never gets a socket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<GatewayState>,
) -> Response {
    let Some(token) = query.token else {
        return (StatusCode::UNAUTHORIZED, "missing token").into_response();
    };
    let identity = match state.verifier.verify(&token) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::debug!(error = %e, "websocket handshake rejected");
            return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
        }
    };
    ws.on_upgrade(move |socket| handle_socket(socket, identity, state))
}

/// Runs one authenticated connection until it closes.
///
/// A sender task drains the connection's room queue into the socket while
/// this task reads acknowledgement frames from the client.
async fn handle_socket(socket: WebSocket, identity: Identity, state: GatewayState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let conn_id = uuid::Uuid::new_v4().to_string();
    let room_names = identity.rooms();

    let mut rx = state.registry.join(&conn_id, &room_names);
    tracing::info!(
        conn_id,
        user_id = %identity.user_id,
        role = %identity.role,
        "websocket connected"
    );

    let sender_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(error = %e, "unserializable live event");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                let text_str: &str = &text;
                let incoming: WsIncoming = match serde_json::from_str(text_str) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(conn_id, "invalid websocket frame: {e}");
                        continue;
                    }
                };
                handle_client_event(&state, &identity, incoming).await;
            }
            Message::Close(_) => break,
            // Binary frames are not part of the protocol; ping/pong is
            // handled by the websocket layer.
            _ => {}
        }
    }

    state.registry.leave(&conn_id, &room_names);
    sender_task.abort();
    tracing::info!(conn_id, user_id = %identity.user_id, "websocket disconnected");
}

/// Applies one acknowledgement frame.
///
/// The service publishes the resulting marked-read and unread-count
/// events on the bus, which loop back to this process's registry, so
/// nothing is pushed directly from here.
async fn handle_client_event(state: &GatewayState, identity: &Identity, incoming: WsIncoming) {
    match incoming.event.as_str() {
        client_events::READ => {
            let Some(id) = incoming.id else {
                tracing::warn!(user_id = %identity.user_id, "notification:read without id");
                return;
            };
            if let Err(e) = state.service.mark_as_read(&id, &identity.user_id).await {
                tracing::warn!(
                    user_id = %identity.user_id,
                    notification_id = %id,
                    error = %e,
                    "mark-read over websocket failed"
                );
            }
        }
        client_events::MARK_ALL_READ => {
            if let Err(e) = state
                .service
                .mark_all_read(&identity.user_id, &NotificationFilter::default())
                .await
            {
                tracing::warn!(
                    user_id = %identity.user_id,
                    error = %e,
                    "mark-all-read over websocket failed"
                );
            }
        }
        other => {
            tracing::debug!(user_id = %identity.user_id, event = other, "unknown client event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_frame_deserializes_with_id() {
        let json = r#"{"event": "notification:read", "id": "n-1"}"#;
        let msg: WsIncoming = serde_json::from_str(json).unwrap();
        assert_eq!(msg.event, client_events::READ);
        assert_eq!(msg.id.as_deref(), Some("n-1"));
    }

    #[test]
    fn mark_all_frame_deserializes_without_id() {
        let json = r#"{"event": "notification:mark-all-read"}"#;
        let msg: WsIncoming = serde_json::from_str(json).unwrap();
        assert_eq!(msg.event, client_events::MARK_ALL_READ);
        assert!(msg.id.is_none());
    }

    #[test]
    fn outbound_frame_shape_is_event_plus_data() {
        let event = deskrelay_core::LiveEvent::new(
            deskrelay_core::events::NOTIFICATION_UNREAD_COUNT,
            serde_json::json!(4),
        );
        let frame = serde_json::to_string(&event).unwrap();
        assert_eq!(
            frame,
            r#"{"event":"notification:unread-count","data":4}"#
        );
    }
}
