// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types owned by the storage crate.
//!
//! Domain types (`Notification`, `DeliveryLogEntry`, `UserPreference`) live
//! in `deskrelay-core::types`; this module holds the queue-internal rows.

use serde::{Deserialize, Serialize};

/// One persisted job in a channel queue.
///
/// Status machine: `pending` -> `processing` -> `completed`, or back to
/// `pending` after backoff, or `failed` once `attempts >= max_attempts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub idempotency_key: String,
    pub queue_name: String,
    /// JSON-encoded [`JobPayload`](deskrelay_core::JobPayload).
    pub payload: String,
    pub priority: i32,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    /// RFC3339 instant before which the job must not be dequeued.
    pub available_at: String,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One deferred event awaiting batched digest delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestEntry {
    pub id: i64,
    pub user_id: String,
    pub notification_id: String,
    pub cadence: String,
    pub created_at: String,
}

/// Outcome of failing a job attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// The job went back to `pending` with a backoff delay.
    Retry { attempts: i32 },
    /// The attempt budget is exhausted; the job is terminally `failed`.
    Terminal { attempts: i32 },
}
