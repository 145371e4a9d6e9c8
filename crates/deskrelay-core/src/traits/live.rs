// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live-push sink trait, implemented by the realtime gateway.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::types::LiveEvent;

/// Sink for events destined to live WebSocket connections on this process.
///
/// The orchestrator pushes through this trait both as the same-process fast
/// path and from the bus subscriber loop. Pushing to a user or room with no
/// live connections is a silent no-op, so redundant pushes are safe.
#[async_trait]
pub trait LivePush: Send + Sync + 'static {
    /// Delivers an event to every live connection in the user's room.
    async fn push_user(&self, user_id: &str, event: LiveEvent) -> Result<(), RelayError>;

    /// Delivers an event to every live connection in a named room
    /// (`agents`, `admins`, or `user:<id>`).
    async fn broadcast(&self, room: &str, event: LiveEvent) -> Result<(), RelayError>;
}
