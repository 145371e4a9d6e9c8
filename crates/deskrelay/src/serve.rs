// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `deskrelay serve` command implementation.
//!
//! Wires the whole engine: SQLite store, pub/sub bus, realtime gateway,
//! notification service, per-channel worker pools, digest scheduler, and
//! the bus subscriber loop that feeds live connections. Runs until
//! SIGINT/SIGTERM, then drains workers and releases adapters in reverse
//! order.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use deskrelay_bus::{LocalBus, RelayBus};
use deskrelay_config::RelayConfig;
use deskrelay_core::{
    Directory, LivePush, NotificationBus, RelayAdapter, RelayError, Transport,
};
use deskrelay_email::EmailTransport;
use deskrelay_gateway::{GatewayListenConfig, RelayGateway};
use deskrelay_notify::{run_subscriber, DigestScheduler, NotificationService};
use deskrelay_push::PushTransport;
use deskrelay_queue::{WorkerPool, WorkerPoolConfig};
use deskrelay_social::SocialTransport;
use deskrelay_storage::SqliteStore;

use crate::directory::HttpDirectory;
use crate::shutdown;

/// Runs the `deskrelay serve` command.
pub async fn run_serve(config: RelayConfig) -> Result<(), RelayError> {
    init_tracing(&config.engine.log_level);
    info!(engine = %config.engine.name, "starting deskrelay serve");

    // Storage first; everything else hangs off the database handle.
    let store = Arc::new(SqliteStore::new(config.storage.clone()));
    store.initialize().await?;
    let db = store.db()?.clone();

    // Directory: the repository boundary to the helpdesk.
    let directory: Arc<dyn Directory> = Arc::new(HttpDirectory::new(&config.directory)?);

    // Bus: local broadcast for single-process deployments, websocket
    // relay for multi-process fanout.
    let bus: Arc<dyn NotificationBus> = match config.bus.mode.as_str() {
        "local" => {
            info!("bus mode: local (single process)");
            Arc::new(LocalBus::new())
        }
        "relay" => {
            let url = config.bus.relay_url.as_deref().ok_or_else(|| {
                RelayError::Config("bus.mode is \"relay\" but bus.relay_url is unset".into())
            })?;
            info!(url, "bus mode: relay");
            Arc::new(RelayBus::connect(url).await?)
        }
        other => {
            return Err(RelayError::Config(format!(
                "unknown bus.mode {other:?} (expected \"local\" or \"relay\")"
            )));
        }
    };

    // The orchestrator, with the direct-send email fallback when the
    // email channel is configured.
    let mut service =
        NotificationService::new(db.clone(), Arc::clone(&bus), Arc::clone(&directory), &config);
    let email_transport: Option<Arc<EmailTransport>> = if config.email.enabled {
        let transport = Arc::new(EmailTransport::new(&config.email)?);
        service = service.with_email_fallback(transport.clone() as Arc<dyn Transport>);
        Some(transport)
    } else {
        info!("email channel disabled by configuration");
        None
    };
    let service = Arc::new(service);

    // Gateway: fail-closed checks before binding anything.
    if config.gateway.bearer_token.is_none() {
        warn!("gateway.bearer_token unset -- the /v1 API will reject every request");
    }
    if config.gateway.token_secret.is_none() {
        warn!("gateway.token_secret unset -- websocket handshakes will reject every token");
    }
    let gateway = Arc::new(RelayGateway::new(
        GatewayListenConfig {
            host: config.gateway.host.clone(),
            port: config.gateway.port,
            bearer_token: config.gateway.bearer_token.clone(),
            token_secret: config.gateway.token_secret.clone(),
        },
        Arc::clone(&service),
    ));
    gateway.start().await?;

    let cancel = shutdown::install_signal_handler();
    let mut worker_handles = Vec::new();

    // Per-channel worker pools.
    let poll_interval = Duration::from_millis(config.workers.poll_interval_ms);
    if let Some(transport) = email_transport {
        let pool = WorkerPool::new(
            "email",
            transport as Arc<dyn Transport>,
            db.clone(),
            WorkerPoolConfig {
                concurrency: config.workers.email_concurrency,
                backoff_base_secs: config.workers.backoff_base_secs,
                poll_interval,
            },
        );
        worker_handles.extend(pool.spawn(cancel.clone()));
    }

    if config.push.enabled {
        let transport: Arc<dyn Transport> =
            Arc::new(PushTransport::new(&config.push, Arc::clone(&directory))?);
        let pool = WorkerPool::new(
            "push",
            transport,
            db.clone(),
            WorkerPoolConfig {
                concurrency: config.workers.push_concurrency,
                backoff_base_secs: config.workers.backoff_base_secs,
                poll_interval,
            },
        );
        worker_handles.extend(pool.spawn(cancel.clone()));
    } else {
        info!("push channel disabled by configuration");
    }

    match SocialTransport::from_config(&config.social)? {
        Some(transport) => {
            let pool = WorkerPool::new(
                "social",
                Arc::new(transport) as Arc<dyn Transport>,
                db.clone(),
                WorkerPoolConfig {
                    concurrency: config.workers.social_concurrency,
                    backoff_base_secs: config.workers.backoff_base_secs,
                    poll_interval,
                },
            );
            worker_handles.extend(pool.spawn(cancel.clone()));
        }
        None => info!("social channel disabled (no webhook configured)"),
    }

    // Digest aggregator.
    let digest_handle = DigestScheduler::new(
        db.clone(),
        Arc::clone(&directory),
        Duration::from_secs(config.digest.flush_interval_secs),
        config.workers.email_max_attempts,
    )
    .spawn(cancel.clone());

    // Bus subscriber loop: every process forwards bus events into its
    // own gateway's rooms.
    let subscriber_handle = {
        let bus = Arc::clone(&bus);
        let live: Arc<dyn LivePush> = gateway.registry();
        let db = db.clone();
        let cancel = cancel.clone();
        tokio::spawn(run_subscriber(bus, db, live, cancel))
    };

    info!("deskrelay serve running");
    cancel.cancelled().await;

    // Drain: workers finish their in-flight attempt, the subscriber and
    // digest loops exit on the token.
    for handle in worker_handles {
        if let Err(e) = handle.await {
            debug!(error = %e, "worker task join failed");
        }
    }
    if let Err(e) = digest_handle.await {
        debug!(error = %e, "digest task join failed");
    }
    if let Err(e) = subscriber_handle.await {
        debug!(error = %e, "subscriber task join failed");
    }

    // Release adapters in reverse of startup order.
    if let Err(e) = gateway.shutdown().await {
        error!(error = %e, "gateway shutdown failed");
    }
    if let Err(e) = bus.shutdown().await {
        error!(error = %e, "bus shutdown failed");
    }
    if let Err(e) = store.shutdown().await {
        error!(error = %e, "storage shutdown failed");
    }

    info!("deskrelay serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("deskrelay={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
