// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process room registry backing the gateway's live fanout.
//!
//! A room maps to the set of connections currently joined to it. Rooms are
//! purely ephemeral: a connection joins its rooms on handshake and is
//! removed on disconnect, so an empty registry after the last socket
//! closes is the steady state, not a leak.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

use deskrelay_core::{rooms, LiveEvent, LivePush, RelayError};

/// Per-connection outbound queue depth. A client that stops reading for
/// this many events gets further events dropped rather than blocking the
/// fanout of everyone else in the room.
const CONNECTION_QUEUE: usize = 64;

/// Registry of live connections keyed by room.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, DashMap<String, mpsc::Sender<LiveEvent>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection in each of its rooms and returns the
    /// receiving end of its outbound queue.
    pub fn join(&self, conn_id: &str, room_names: &[String]) -> mpsc::Receiver<LiveEvent> {
        let (tx, rx) = mpsc::channel(CONNECTION_QUEUE);
        for room in room_names {
            self.rooms
                .entry(room.clone())
                .or_default()
                .insert(conn_id.to_string(), tx.clone());
        }
        rx
    }

    /// Removes a connection from its rooms, dropping empty rooms.
    pub fn leave(&self, conn_id: &str, room_names: &[String]) {
        for room in room_names {
            if let Some(members) = self.rooms.get(room) {
                members.remove(conn_id);
            }
            self.rooms.remove_if(room, |_, members| members.is_empty());
        }
    }

    /// Number of connections currently in a room.
    pub fn room_size(&self, room: &str) -> usize {
        self.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }

    /// Total number of distinct rooms with at least one connection.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn send_room(&self, room: &str, event: &LiveEvent) {
        let Some(members) = self.rooms.get(room) else {
            // Nobody connected here; that is normal, not an error.
            return;
        };
        let mut delivered = 0usize;
        let mut dropped = 0usize;
        for member in members.iter() {
            match member.value().try_send(event.clone()) {
                Ok(()) => delivered += 1,
                // Full queue or disconnected receiver: skip. Stale
                // entries are cleaned up by the connection's own leave().
                Err(_) => dropped += 1,
            }
        }
        tracing::trace!(room, event = %event.event, delivered, dropped, "room fanout");
    }
}

#[async_trait]
impl LivePush for RoomRegistry {
    async fn push_user(&self, user_id: &str, event: LiveEvent) -> Result<(), RelayError> {
        self.send_room(&rooms::user(user_id), &event);
        Ok(())
    }

    async fn broadcast(&self, room: &str, event: LiveEvent) -> Result<(), RelayError> {
        self.send_room(room, &event);
        Ok(())
    }
}
