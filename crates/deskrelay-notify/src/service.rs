// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The notification orchestrator.
//!
//! Owns the notification row lifecycle: creation with channel fan-out,
//! read-state mutations, paged queries, and the administrative delete.
//! Creation is synchronous up to the database write and routing decision;
//! external delivery runs in the per-channel worker pools and is never
//! awaited here.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use deskrelay_config::model::RelayConfig;
use deskrelay_core::{
    events, BusEvent, DeliveryChannel, Directory, LiveEvent, Notification, NotificationBus,
    NotificationKind, NotificationMetadata, RelayError, Role, Transport,
};
use deskrelay_router::{ChannelRouter, RoutingDecision};
use deskrelay_storage::queries::{digest, notifications};
use deskrelay_storage::queries::notifications::{MutationOutcome, NotificationFilter};
use deskrelay_storage::Database;

/// Request to create one notification.
#[derive(Debug, Clone)]
pub struct CreateNotification {
    /// Caller-supplied id. Triggers derive deterministic ids from the
    /// logical event so duplicate triggers collapse onto one row; `None`
    /// generates a fresh UUID.
    pub id: Option<String>,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub user_id: String,
    pub related_id: Option<String>,
    pub actor_id: Option<String>,
    pub metadata: Option<NotificationMetadata>,
    /// Explicit channel set, bypassing the router entirely.
    pub channels: Option<BTreeSet<DeliveryChannel>>,
}

impl CreateNotification {
    pub fn new(kind: NotificationKind, title: &str, body: &str, user_id: &str) -> Self {
        Self {
            id: None,
            kind,
            title: title.to_string(),
            body: body.to_string(),
            user_id: user_id.to_string(),
            related_id: None,
            actor_id: None,
            metadata: None,
            channels: None,
        }
    }
}

/// One page of a user's notifications plus scope-wide counts.
#[derive(Debug, Clone)]
pub struct NotificationPage {
    pub items: Vec<Notification>,
    pub total: i64,
    pub unread: i64,
    pub page: u32,
    pub page_size: u32,
}

/// The orchestrator. One per process, shared behind `Arc`.
pub struct NotificationService {
    pub(crate) db: Database,
    pub(crate) router: ChannelRouter,
    pub(crate) bus: Arc<dyn NotificationBus>,
    pub(crate) directory: Arc<dyn Directory>,
    /// Same-process direct-send fallback for email when the queue is
    /// unavailable.
    pub(crate) email_fallback: Option<Arc<dyn Transport>>,
    pub(crate) workers: deskrelay_config::model::WorkerConfig,
    pub(crate) base_url: String,
    pub(crate) dedup_window_secs: u64,
}

impl NotificationService {
    pub fn new(
        db: Database,
        bus: Arc<dyn NotificationBus>,
        directory: Arc<dyn Directory>,
        config: &RelayConfig,
    ) -> Self {
        Self {
            db,
            router: ChannelRouter::new(),
            bus,
            directory,
            email_fallback: None,
            workers: config.workers.clone(),
            base_url: config.engine.base_url.trim_end_matches('/').to_string(),
            dedup_window_secs: config.dedup.social_window_secs,
        }
    }

    /// Install the direct-send email fallback used when enqueue fails.
    pub fn with_email_fallback(mut self, transport: Arc<dyn Transport>) -> Self {
        self.email_fallback = Some(transport);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Create a notification and fan it out.
    ///
    /// Returns the stored row. Delivery failures on individual channels
    /// are recorded in the delivery log, never surfaced here.
    pub async fn create(&self, input: CreateNotification) -> Result<Notification, RelayError> {
        if input.title.trim().is_empty() {
            return Err(RelayError::Validation("title must not be empty".into()));
        }
        if input.body.trim().is_empty() {
            return Err(RelayError::Validation("body must not be empty".into()));
        }
        if input.user_id.trim().is_empty() {
            return Err(RelayError::Validation("user_id must not be empty".into()));
        }

        let notification = Notification {
            id: input
                .id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            kind: input.kind,
            title: input.title,
            body: input.body,
            user_id: input.user_id,
            related_id: input.related_id,
            actor_id: input.actor_id,
            metadata: input.metadata,
            read: false,
            read_at: None,
            created_at: String::new(),
        };
        let stored = notifications::insert(&self.db, &notification).await?;

        let decision = match input.channels {
            Some(channels) => RoutingDecision {
                channels,
                deferred_digest: None,
            },
            None => {
                let preference = deskrelay_storage::queries::preferences::get(
                    &self.db,
                    &stored.user_id,
                    stored.kind,
                )
                .await?;
                self.router.determine(
                    &stored.user_id,
                    stored.kind,
                    preference,
                    chrono::Local::now().time(),
                )
            }
        };

        if let Some(cadence) = decision.deferred_digest {
            if let Err(e) = digest::push(&self.db, &stored.user_id, &stored.id, cadence).await {
                warn!(notification_id = %stored.id, error = %e, "failed to defer to digest queue");
            }
        }

        self.send_to_channels(&stored, &decision.channels).await;

        // Live fan-out happens in every process's bus subscriber loop,
        // including this one; both bus implementations deliver a publish
        // back to the publishing process.
        if let Err(e) = self
            .bus
            .publish(BusEvent::NotificationCreated {
                notification: stored.clone(),
            })
            .await
        {
            warn!(notification_id = %stored.id, error = %e, "bus publish failed");
        }

        debug!(notification_id = %stored.id, kind = %stored.kind, "notification created");
        Ok(stored)
    }

    /// Mark one notification read, enforcing ownership.
    pub async fn mark_as_read(&self, id: &str, user_id: &str) -> Result<(), RelayError> {
        match notifications::mark_read(&self.db, id, user_id).await? {
            MutationOutcome::Applied => {}
            MutationOutcome::NotOwner => {
                return Err(RelayError::Unauthorized(format!(
                    "notification {id} belongs to another user"
                )));
            }
            MutationOutcome::Missing => {
                return Err(RelayError::NotFound(format!("notification {id}")));
            }
        }

        let count = self.unread_count(user_id, &NotificationFilter::default()).await?;
        self.emit_to_user(
            user_id,
            events::NOTIFICATION_MARKED_READ,
            serde_json::json!({ "id": id }),
        )
        .await;
        self.emit_to_user(
            user_id,
            events::NOTIFICATION_UNREAD_COUNT,
            serde_json::json!(count),
        )
        .await;
        Ok(())
    }

    /// Mark every unread notification in scope read. Returns the number
    /// of rows flipped.
    pub async fn mark_all_read(
        &self,
        user_id: &str,
        filter: &NotificationFilter,
    ) -> Result<u64, RelayError> {
        let flipped = notifications::mark_all_read(&self.db, user_id, filter).await?;

        let count = self.unread_count(user_id, &NotificationFilter::default()).await?;
        self.emit_to_user(
            user_id,
            events::NOTIFICATION_ALL_MARKED_READ,
            serde_json::Value::Null,
        )
        .await;
        self.emit_to_user(
            user_id,
            events::NOTIFICATION_UNREAD_COUNT,
            serde_json::json!(count),
        )
        .await;
        Ok(flipped)
    }

    pub async fn unread_count(
        &self,
        user_id: &str,
        filter: &NotificationFilter,
    ) -> Result<i64, RelayError> {
        notifications::unread_count(&self.db, user_id, filter).await
    }

    pub async fn list(
        &self,
        user_id: &str,
        page: u32,
        page_size: u32,
        filter: &NotificationFilter,
    ) -> Result<NotificationPage, RelayError> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);
        let (items, total, unread) =
            notifications::list(&self.db, user_id, page, page_size, filter).await?;
        Ok(NotificationPage {
            items,
            total,
            unread,
            page,
            page_size,
        })
    }

    /// Administrative delete. Distinguishes "not allowed" from "not found".
    pub async fn delete(&self, id: &str, requesting_user_id: &str) -> Result<(), RelayError> {
        let role = self.directory.role_of(requesting_user_id).await?;
        if role != Role::Admin {
            return Err(RelayError::Unauthorized(
                "only administrators may delete notifications".into(),
            ));
        }
        if notifications::delete(&self.db, id).await? {
            Ok(())
        } else {
            Err(RelayError::NotFound(format!("notification {id}")))
        }
    }

    /// Generic event emission: pushes a UI-refresh event to rooms on every
    /// process, bypassing the notification model.
    pub async fn emit(
        &self,
        event: &str,
        data: serde_json::Value,
        rooms: Vec<String>,
    ) -> Result<(), RelayError> {
        self.bus
            .publish(BusEvent::Emit {
                event: event.to_string(),
                data,
                rooms,
            })
            .await
    }

    /// Publish a room-scoped event for one user, logging instead of
    /// propagating bus failures.
    async fn emit_to_user(&self, user_id: &str, event: &str, data: serde_json::Value) {
        let room = format!("user:{user_id}");
        if let Err(e) = self
            .bus
            .publish(BusEvent::Emit {
                event: event.to_string(),
                data,
                rooms: vec![room],
            })
            .await
        {
            warn!(user_id, event, error = %e, "bus publish failed");
        }
    }

    pub(crate) fn ticket_link(&self, related_id: Option<&str>) -> Option<String> {
        related_id.map(|id| format!("{}/tickets/{id}", self.base_url))
    }
}

/// Builds the `LiveEvent` for a freshly created notification. Used by the
/// bus subscriber loop.
pub fn notification_event(notification: &Notification) -> LiveEvent {
    LiveEvent::new(
        events::NOTIFICATION_NEW,
        serde_json::json!(notification),
    )
}
