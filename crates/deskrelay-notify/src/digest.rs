// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Digest aggregator.
//!
//! Drains the pending-digest queue on an interval and turns each due
//! (user, cadence) batch into one summary email job. Batches for users
//! with no email address on file are flushed and dropped; deferring them
//! forever would grow the queue without an exit.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use deskrelay_core::{DeliveryChannel, DigestMode, Directory, JobPayload, RelayError};
use deskrelay_storage::queries::{digest, jobs, notifications};
use deskrelay_storage::Database;

const DIGEST_CADENCES: [DigestMode; 3] =
    [DigestMode::Hourly, DigestMode::Daily, DigestMode::Weekly];

/// Interval-driven aggregator flushing due digest batches into email jobs.
pub struct DigestScheduler {
    db: Database,
    directory: Arc<dyn Directory>,
    flush_interval: Duration,
    email_max_attempts: i32,
}

impl DigestScheduler {
    pub fn new(
        db: Database,
        directory: Arc<dyn Directory>,
        flush_interval: Duration,
        email_max_attempts: i32,
    ) -> Self {
        Self {
            db,
            directory,
            flush_interval,
            email_max_attempts,
        }
    }

    /// Spawn the flush loop. Runs until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval = ?self.flush_interval, "digest scheduler running");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("digest scheduler stopping");
                        break;
                    }
                    _ = tokio::time::sleep(self.flush_interval) => {
                        if let Err(e) = self.flush_due().await {
                            warn!(error = %e, "digest flush failed");
                        }
                    }
                }
            }
        })
    }

    /// One flush pass over every cadence. Public so tests (and a future
    /// admin endpoint) can force a flush without waiting for the interval.
    pub async fn flush_due(&self) -> Result<usize, RelayError> {
        let mut flushed = 0;
        for cadence in DIGEST_CADENCES {
            for batch in digest::due_batches(&self.db, cadence).await? {
                self.flush_batch(cadence, batch).await?;
                flushed += 1;
            }
        }
        Ok(flushed)
    }

    async fn flush_batch(
        &self,
        cadence: DigestMode,
        batch: digest::DigestBatch,
    ) -> Result<(), RelayError> {
        let entry_ids: Vec<i64> = batch.entries.iter().map(|e| e.id).collect();

        let Some(recipient) = self.directory.user_email(&batch.user_id).await? else {
            warn!(
                user_id = %batch.user_id,
                entries = batch.entries.len(),
                "digest user has no email address, dropping batch"
            );
            digest::mark_flushed(&self.db, &entry_ids).await?;
            return Ok(());
        };

        // Summary body: one line per batched notification, oldest first.
        let mut lines = Vec::with_capacity(batch.entries.len());
        for entry in &batch.entries {
            if let Some(n) = notifications::get(&self.db, &entry.notification_id).await? {
                lines.push(format!("- {}", n.title));
            }
        }
        if lines.is_empty() {
            // Every underlying notification was deleted; nothing to send.
            digest::mark_flushed(&self.db, &entry_ids).await?;
            return Ok(());
        }

        let oldest = batch.entries[0].id;
        let title = format!(
            "Your {cadence} notification digest ({} update{})",
            lines.len(),
            if lines.len() == 1 { "" } else { "s" }
        );
        let payload = JobPayload {
            // Synthetic id: digest emails have no notification row of their
            // own, and the oldest entry id makes a re-flush a duplicate.
            notification_id: format!("digest:{}:{}:{oldest}", batch.user_id, cadence),
            channel: DeliveryChannel::Email,
            user_id: batch.user_id.clone(),
            recipient: Some(recipient),
            title,
            body: lines.join("\n"),
            link: None,
            threading: None,
            social: None,
        };
        let body = serde_json::to_string(&payload).map_err(|e| {
            RelayError::Internal(format!("failed to serialize digest payload: {e}"))
        })?;
        jobs::enqueue(
            &self.db,
            &payload.idempotency_key(),
            &DeliveryChannel::Email.queue_name(),
            &body,
            1,
            self.email_max_attempts,
        )
        .await?;
        digest::mark_flushed(&self.db, &entry_ids).await?;
        debug!(
            user_id = %batch.user_id,
            %cadence,
            entries = entry_ids.len(),
            "digest batch flushed"
        );
        Ok(())
    }
}
