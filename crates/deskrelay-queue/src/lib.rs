// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-channel worker pools for the deskrelay notification engine.
//!
//! A [`WorkerPool`] drains one named queue with a bounded number of
//! concurrent workers, handing each dequeued job to its channel
//! [`Transport`] and applying the retry policy on failure. Job state and
//! the delivery log are updated from here, so a crash between dequeue and
//! acknowledgement leaves the job `processing` and visible to operators
//! rather than silently lost.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use deskrelay_core::{JobPayload, RelayError, Transport};
use deskrelay_storage::models::{FailOutcome, Job};
use deskrelay_storage::queries::{delivery, jobs};
use deskrelay_storage::Database;

/// Tuning knobs for one pool, taken from the `[workers]` config section.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub concurrency: usize,
    pub backoff_base_secs: u64,
    pub poll_interval: Duration,
}

/// A bounded pool of workers draining one queue into one transport.
pub struct WorkerPool {
    queue_name: String,
    transport: Arc<dyn Transport>,
    db: Database,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    pub fn new(
        queue_name: impl Into<String>,
        transport: Arc<dyn Transport>,
        db: Database,
        config: WorkerPoolConfig,
    ) -> Self {
        Self {
            queue_name: queue_name.into(),
            transport,
            db,
            config,
        }
    }

    /// Spawn the configured number of workers. Each runs until `cancel`
    /// fires; in-flight jobs finish their current attempt before the
    /// worker exits.
    pub fn spawn(&self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        info!(
            queue = %self.queue_name,
            concurrency = self.config.concurrency,
            "starting worker pool"
        );
        (0..self.config.concurrency)
            .map(|worker_id| {
                let queue_name = self.queue_name.clone();
                let transport = Arc::clone(&self.transport);
                let db = self.db.clone();
                let config = self.config.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    worker_loop(worker_id, queue_name, transport, db, config, cancel).await;
                })
            })
            .collect()
    }
}

async fn worker_loop(
    worker_id: usize,
    queue_name: String,
    transport: Arc<dyn Transport>,
    db: Database,
    config: WorkerPoolConfig,
    cancel: CancellationToken,
) {
    debug!(queue = %queue_name, worker_id, "worker started");
    loop {
        if cancel.is_cancelled() {
            break;
        }
        match jobs::dequeue(&db, &queue_name).await {
            Ok(Some(job)) => {
                process_job(&transport, &db, &config, job).await;
            }
            Ok(None) => {
                // Empty queue; wait for the next poll or for shutdown.
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(config.poll_interval) => {}
                }
            }
            Err(e) => {
                error!(queue = %queue_name, worker_id, error = %e, "dequeue failed");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(config.poll_interval) => {}
                }
            }
        }
    }
    debug!(queue = %queue_name, worker_id, "worker stopped");
}

async fn process_job(
    transport: &Arc<dyn Transport>,
    db: &Database,
    config: &WorkerPoolConfig,
    job: Job,
) {
    let payload: JobPayload = match serde_json::from_str(&job.payload) {
        Ok(p) => p,
        Err(e) => {
            // A payload that does not parse will never parse; burn its
            // attempts through the normal failure path so the row ends up
            // terminally failed with the parse error recorded.
            warn!(job_id = job.id, error = %e, "malformed job payload");
            if let Err(e) = jobs::fail(db, job.id, &format!("malformed payload: {e}"), 0).await {
                error!(job_id = job.id, error = %e, "failed to record job failure");
            }
            return;
        }
    };

    let attempt = job.attempts + 1;
    match transport.deliver(&payload).await {
        Ok(receipt) => {
            debug!(
                job_id = job.id,
                notification_id = %payload.notification_id,
                channel = %payload.channel,
                attempt,
                "delivery succeeded"
            );
            if let Err(e) = jobs::complete(db, job.id).await {
                error!(job_id = job.id, error = %e, "failed to complete job");
            }
            if let Err(e) = delivery::mark_sent(
                db,
                &payload.notification_id,
                payload.channel,
                attempt,
                receipt.message_id.as_deref(),
            )
            .await
            {
                error!(job_id = job.id, error = %e, "failed to update delivery log");
            }
        }
        Err(delivery_error) => {
            let outcome = match jobs::fail(
                db,
                job.id,
                &delivery_error.to_string(),
                config.backoff_base_secs,
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(job_id = job.id, error = %e, "failed to record job failure");
                    return;
                }
            };
            match outcome {
                FailOutcome::Retry { attempts } => {
                    warn!(
                        job_id = job.id,
                        notification_id = %payload.notification_id,
                        channel = %payload.channel,
                        attempts,
                        error = %delivery_error,
                        "delivery failed, will retry"
                    );
                }
                FailOutcome::Terminal { attempts } => {
                    warn!(
                        job_id = job.id,
                        notification_id = %payload.notification_id,
                        channel = %payload.channel,
                        attempts,
                        error = %delivery_error,
                        "delivery failed terminally"
                    );
                    if let Err(e) = delivery::mark_failed(
                        db,
                        &payload.notification_id,
                        payload.channel,
                        attempts,
                        &delivery_error.to_string(),
                    )
                    .await
                    {
                        error!(job_id = job.id, error = %e, "failed to update delivery log");
                    }
                }
            }
        }
    }
}

/// Drain-one helper used by tests and the digest scheduler: runs a single
/// dequeue/deliver cycle and reports whether a job was processed.
pub async fn run_once(
    queue_name: &str,
    transport: &Arc<dyn Transport>,
    db: &Database,
    config: &WorkerPoolConfig,
) -> Result<bool, RelayError> {
    match jobs::dequeue(db, queue_name).await? {
        Some(job) => {
            process_job(transport, db, config, job).await;
            Ok(true)
        }
        None => Ok(false),
    }
}
