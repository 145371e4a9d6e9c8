// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bus subscriber loop.
//!
//! One per process. Receives every bus event (including this process's own
//! publishes) and forwards it to the local live-push sink. Unread counts
//! are recomputed here rather than trusted from event ordering; the bus is
//! at-least-once and unordered relative to the originating write.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use deskrelay_core::{
    events, BusEvent, LiveEvent, LivePush, NotificationBus, RelayError,
};
use deskrelay_storage::queries::notifications;
use deskrelay_storage::queries::notifications::NotificationFilter;
use deskrelay_storage::Database;

use crate::service::notification_event;

/// Run the subscriber loop until the token is cancelled.
pub async fn run_subscriber(
    bus: Arc<dyn NotificationBus>,
    db: Database,
    live: Arc<dyn LivePush>,
    cancel: CancellationToken,
) {
    let mut rx = bus.subscribe();
    info!("bus subscriber running");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("bus subscriber stopping");
                break;
            }
            event = rx.recv() => match event {
                Ok(event) => {
                    if let Err(e) = handle_event(&db, live.as_ref(), event).await {
                        warn!(error = %e, "failed to fan out bus event");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    // Dropped events self-heal: the UI re-queries counts.
                    warn!(lagged = count, "bus subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("bus channel closed, subscriber exiting");
                    break;
                }
            }
        }
    }
}

async fn handle_event(
    db: &Database,
    live: &dyn LivePush,
    event: BusEvent,
) -> Result<(), RelayError> {
    match event {
        BusEvent::NotificationCreated { notification } => {
            let user_id = notification.user_id.clone();
            // Recompute rather than increment: this event may arrive before
            // or after the row is visible to this process's reads.
            let count =
                notifications::unread_count(db, &user_id, &NotificationFilter::default()).await?;
            live.push_user(&user_id, notification_event(&notification))
                .await?;
            live.push_user(
                &user_id,
                LiveEvent::new(events::NOTIFICATION_UNREAD_COUNT, serde_json::json!(count)),
            )
            .await?;
            debug!(notification_id = %notification.id, unread = count, "live fan-out complete");
            Ok(())
        }
        BusEvent::Emit { event, data, rooms } => {
            for room in rooms {
                live.broadcast(&room, LiveEvent::new(&event, data.clone()))
                    .await?;
            }
            Ok(())
        }
    }
}
