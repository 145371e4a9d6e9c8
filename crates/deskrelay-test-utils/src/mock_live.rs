// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock live-push sink capturing everything the orchestrator emits.

use std::sync::Mutex;

use async_trait::async_trait;

use deskrelay_core::{LiveEvent, LivePush, RelayError};

/// Records every pushed event instead of delivering it.
#[derive(Default)]
pub struct MockLivePush {
    pushed: Mutex<Vec<(String, LiveEvent)>>,
}

impl MockLivePush {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured (room, event) pairs, in push order. User pushes are
    /// recorded under their `user:<id>` room.
    pub fn pushed(&self) -> Vec<(String, LiveEvent)> {
        self.pushed.lock().unwrap().clone()
    }

    /// Events captured for one room, by event name.
    pub fn events_for(&self, room: &str) -> Vec<LiveEvent> {
        self.pushed
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| r == room)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

#[async_trait]
impl LivePush for MockLivePush {
    async fn push_user(&self, user_id: &str, event: LiveEvent) -> Result<(), RelayError> {
        self.pushed
            .lock()
            .unwrap()
            .push((format!("user:{user_id}"), event));
        Ok(())
    }

    async fn broadcast(&self, room: &str, event: LiveEvent) -> Result<(), RelayError> {
        self.pushed.lock().unwrap().push((room.to_string(), event));
        Ok(())
    }
}
