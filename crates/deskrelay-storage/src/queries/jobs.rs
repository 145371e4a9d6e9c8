// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable prioritized job queue operations.
//!
//! One logical queue per external channel. Dequeue is transactional:
//! the oldest available, highest-priority pending job is atomically marked
//! `processing` with a 5-minute lock implied by `available_at`.

use deskrelay_core::RelayError;
use rusqlite::params;

use crate::database::Database;
use crate::models::{FailOutcome, Job};

/// Enqueue a job. Returns the row id, or `None` when a job with the same
/// idempotency key already exists (duplicate enqueue is a no-op).
pub async fn enqueue(
    db: &Database,
    idempotency_key: &str,
    queue_name: &str,
    payload: &str,
    priority: i32,
    max_attempts: i32,
) -> Result<Option<i64>, RelayError> {
    let idempotency_key = idempotency_key.to_string();
    let queue_name = queue_name.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO jobs
                     (idempotency_key, queue_name, payload, priority, max_attempts)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![idempotency_key, queue_name, payload, priority, max_attempts],
            )?;
            if inserted == 0 {
                Ok(None)
            } else {
                Ok(Some(conn.last_insert_rowid()))
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Dequeue the next available job from the named queue.
///
/// Selects the highest-priority pending job whose backoff has elapsed and
/// marks it `processing` in the same transaction. Returns `None` if the
/// queue has nothing runnable.
pub async fn dequeue(db: &Database, queue_name: &str) -> Result<Option<Job>, RelayError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let result = {
                let mut stmt = tx.prepare(
                    "SELECT id, idempotency_key, queue_name, payload, priority, status,
                            attempts, max_attempts, available_at, last_error,
                            created_at, updated_at
                     FROM jobs
                     WHERE queue_name = ?1 AND status = 'pending'
                       AND available_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     ORDER BY priority DESC, id ASC
                     LIMIT 1",
                )?;
                stmt.query_row(params![queue_name], |row| {
                    Ok(Job {
                        id: row.get(0)?,
                        idempotency_key: row.get(1)?,
                        queue_name: row.get(2)?,
                        payload: row.get(3)?,
                        priority: row.get(4)?,
                        status: row.get(5)?,
                        attempts: row.get(6)?,
                        max_attempts: row.get(7)?,
                        available_at: row.get(8)?,
                        last_error: row.get(9)?,
                        created_at: row.get(10)?,
                        updated_at: row.get(11)?,
                    })
                })
            };

            match result {
                Ok(job) => {
                    tx.execute(
                        "UPDATE jobs SET status = 'processing',
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE id = ?1",
                        params![job.id],
                    )?;
                    tx.commit()?;
                    Ok(Some(Job {
                        status: "processing".to_string(),
                        ..job
                    }))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Acknowledge successful processing. The row is retained as `completed`
/// so the idempotency key keeps absorbing duplicate triggers.
pub async fn complete(db: &Database, id: i64) -> Result<(), RelayError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE jobs SET status = 'completed',
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a failed attempt.
///
/// Increments `attempts`. If the budget is exhausted the job becomes
/// terminally `failed`; otherwise it returns to `pending` with an
/// exponential backoff (`base * 2^(attempts-1)` seconds).
pub async fn fail(
    db: &Database,
    id: i64,
    error: &str,
    backoff_base_secs: u64,
) -> Result<FailOutcome, RelayError> {
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            let (attempts, max_attempts): (i32, i32) = conn.query_row(
                "SELECT attempts, max_attempts FROM jobs WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let new_attempts = attempts + 1;
            if new_attempts >= max_attempts {
                conn.execute(
                    "UPDATE jobs SET status = 'failed', attempts = ?1, last_error = ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?3",
                    params![new_attempts, error, id],
                )?;
                Ok(FailOutcome::Terminal {
                    attempts: new_attempts,
                })
            } else {
                let delay_secs =
                    backoff_base_secs.saturating_mul(1u64 << (new_attempts - 1).max(0) as u32);
                let modifier = format!("+{delay_secs} seconds");
                conn.execute(
                    "UPDATE jobs SET status = 'pending', attempts = ?1, last_error = ?2,
                     available_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?3),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?4",
                    params![new_attempts, error, modifier, id],
                )?;
                Ok(FailOutcome::Retry {
                    attempts: new_attempts,
                })
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch one job by id (diagnostics and tests).
pub async fn get(db: &Database, id: i64) -> Result<Option<Job>, RelayError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, idempotency_key, queue_name, payload, priority, status,
                        attempts, max_attempts, available_at, last_error,
                        created_at, updated_at
                 FROM jobs WHERE id = ?1",
            )?;
            let result = stmt.query_row(params![id], |row| {
                Ok(Job {
                    id: row.get(0)?,
                    idempotency_key: row.get(1)?,
                    queue_name: row.get(2)?,
                    payload: row.get(3)?,
                    priority: row.get(4)?,
                    status: row.get(5)?,
                    attempts: row.get(6)?,
                    max_attempts: row.get(7)?,
                    available_at: row.get(8)?,
                    last_error: row.get(9)?,
                    created_at: row.get(10)?,
                    updated_at: row.get(11)?,
                })
            });
            match result {
                Ok(job) => Ok(Some(job)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Count jobs in a queue with the given status (observability).
pub async fn count_with_status(
    db: &Database,
    queue_name: &str,
    status: &str,
) -> Result<i64, RelayError> {
    let queue_name = queue_name.to_string();
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM jobs WHERE queue_name = ?1 AND status = ?2",
                params![queue_name, status],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
