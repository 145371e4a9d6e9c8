// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the deskrelay workspace.
//!
//! Timestamps are RFC3339 UTC strings throughout; SQLite generates them
//! with `strftime('%Y-%m-%dT%H:%M:%fZ','now')` so lexicographic order is
//! chronological order.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Identifies the type of adapter registered with the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum AdapterType {
    Storage,
    Bus,
    Transport,
    Gateway,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Closed set of notification kinds surfaced by the helpdesk.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    TicketAssigned,
    TicketUpdated,
    TicketReply,
    TicketStatusChanged,
    TicketMention,
    SlaBreach,
    PriorityEscalation,
    SocialMessage,
    SocialComment,
    SocialPost,
}

impl NotificationKind {
    /// Job priority derived from the kind. Higher dequeues first.
    pub fn priority(self) -> i32 {
        match self {
            Self::SlaBreach | Self::PriorityEscalation => 3,
            Self::TicketAssigned | Self::TicketReply | Self::TicketStatusChanged => 2,
            _ => 1,
        }
    }

    /// Kinds that bypass quiet hours entirely.
    pub fn is_urgent(self) -> bool {
        matches!(self, Self::SlaBreach | Self::PriorityEscalation)
    }

    /// Kinds belonging to the social-event family.
    pub fn is_social(self) -> bool {
        matches!(
            self,
            Self::SocialMessage | Self::SocialComment | Self::SocialPost
        )
    }

    /// Kinds that get email in addition to in-app when the user has no
    /// stored preference.
    pub fn default_email(self) -> bool {
        matches!(
            self,
            Self::TicketAssigned
                | Self::TicketReply
                | Self::TicketStatusChanged
                | Self::SlaBreach
                | Self::PriorityEscalation
        )
    }
}

/// A delivery medium for one notification attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryChannel {
    InApp,
    Email,
    Push,
    Sms,
    Social,
}

impl DeliveryChannel {
    /// Queue name carrying jobs for this channel. In-app has no queue;
    /// it is delivered synchronously.
    pub fn queue_name(self) -> String {
        self.to_string()
    }
}

/// Status of one (notification, channel) delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

/// Per-kind metadata attached to a notification.
///
/// Modeled as a tagged union rather than an open key/value map so renderers
/// (email templates, UI badges) can match exhaustively. `Custom` is the
/// escape hatch for producers outside the closed set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationMetadata {
    Assignment {
        agent_name: String,
    },
    Reply {
        reply_content: String,
        agent_name: String,
    },
    StatusChange {
        old_status: String,
        new_status: String,
    },
    Mention {
        excerpt: String,
    },
    Sla {
        policy: String,
        deadline: String,
    },
    Social {
        page_id: String,
        post_id: String,
        author: String,
    },
    Custom {
        extra: serde_json::Value,
    },
}

/// One logical event surfaced to one user.
///
/// Created once by the orchestrator; mutated only to flip `read`/`read_at`;
/// deleted only by an explicit administrative delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub user_id: String,
    pub related_id: Option<String>,
    pub actor_id: Option<String>,
    pub metadata: Option<NotificationMetadata>,
    pub read: bool,
    pub read_at: Option<String>,
    pub created_at: String,
}

/// One row per (notification, channel) delivery attempt.
///
/// At most one active entry per pair; retries update the same entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryLogEntry {
    pub id: i64,
    pub notification_id: String,
    pub channel: DeliveryChannel,
    pub status: DeliveryStatus,
    pub recipient: Option<String>,
    pub sent_at: Option<String>,
    pub failed_at: Option<String>,
    pub error_message: Option<String>,
    pub attempts: i32,
    /// Transport-specific message id, used for email threading.
    pub message_id: Option<String>,
}

/// Email digest cadence for a (user, kind) preference.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DigestMode {
    #[default]
    Realtime,
    Hourly,
    Daily,
    Weekly,
}

/// Per-user, per-kind channel preference. Absence implies the documented
/// defaults (see [`NotificationKind::default_email`]). Read-only to this
/// subsystem; mutated by the user through the helpdesk UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreference {
    pub user_id: String,
    pub kind: NotificationKind,
    pub in_app: bool,
    pub email: bool,
    pub push: bool,
    pub sms: bool,
    pub social: bool,
    pub digest: DigestMode,
    pub quiet_hours_enabled: bool,
    /// Quiet window start, minutes since local midnight (0..=1439).
    pub quiet_start_min: u16,
    /// Quiet window end, minutes since local midnight. May be numerically
    /// smaller than the start when the window wraps midnight.
    pub quiet_end_min: u16,
}

impl UserPreference {
    /// A preference with the documented defaults for `kind`.
    pub fn defaults_for(user_id: &str, kind: NotificationKind) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind,
            in_app: true,
            email: kind.default_email(),
            push: false,
            sms: false,
            social: false,
            digest: DigestMode::Realtime,
            quiet_hours_enabled: false,
            quiet_start_min: 0,
            quiet_end_min: 0,
        }
    }
}

/// Email threading metadata carried inside an email job payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailThreading {
    pub subject: String,
    /// Transport message id of the most recent prior outbound email for the
    /// same related entity.
    pub in_reply_to: Option<String>,
    /// Full chronological chain of prior message ids for the entity,
    /// deduplicated, first entry always the original creation message id.
    pub references: Vec<String>,
}

/// Social-channel payload carried inside a social job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPayload {
    pub page_id: String,
    pub post_id: String,
}

/// The rendered payload a worker hands to a channel transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    pub notification_id: String,
    pub channel: DeliveryChannel,
    pub user_id: String,
    pub recipient: Option<String>,
    pub title: String,
    pub body: String,
    /// Deep-link URL derived from the related entity (push and digest).
    pub link: Option<String>,
    pub threading: Option<EmailThreading>,
    pub social: Option<SocialPayload>,
}

impl JobPayload {
    /// Deterministic idempotency key. A duplicate enqueue of the same
    /// (notification, channel) pair is a no-op.
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}", self.notification_id, self.channel)
    }
}

/// Receipt returned by a channel transport on successful delivery.
#[derive(Debug, Clone, Default)]
pub struct TransportReceipt {
    pub message_id: Option<String>,
}

/// Role attached to an authenticated connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    Admin,
}

/// A verified identity resolved from a handshake token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    /// Rooms this identity joins on connect: `user:<id>` always, `agents`
    /// for agents and admins, `admins` for admins.
    pub fn rooms(&self) -> Vec<String> {
        let mut rooms = vec![rooms::user(&self.user_id)];
        if matches!(self.role, Role::Agent | Role::Admin) {
            rooms.push(rooms::AGENTS.to_string());
        }
        if self.role == Role::Admin {
            rooms.push(rooms::ADMINS.to_string());
        }
        rooms
    }
}

/// Room name helpers.
pub mod rooms {
    /// Room holding every connected agent and admin.
    pub const AGENTS: &str = "agents";
    /// Room holding every connected admin.
    pub const ADMINS: &str = "admins";

    /// Per-user room name.
    pub fn user(user_id: &str) -> String {
        format!("user:{user_id}")
    }
}

/// Outbound event names on the WebSocket protocol.
pub mod events {
    /// Full notification object.
    pub const NOTIFICATION_NEW: &str = "notification:new";
    /// Id of a notification just marked read.
    pub const NOTIFICATION_MARKED_READ: &str = "notification:marked-read";
    /// Integer unread count for the target user.
    pub const NOTIFICATION_UNREAD_COUNT: &str = "notification:unread-count";
    /// All notifications marked read.
    pub const NOTIFICATION_ALL_MARKED_READ: &str = "notification:all-marked-read";
}

/// One event pushed to live connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveEvent {
    pub event: String,
    pub data: serde_json::Value,
}

impl LiveEvent {
    pub fn new(event: &str, data: serde_json::Value) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }
}

/// Events carried on the publish/subscribe bus.
///
/// Broadcast to every subscribing process; at-least-once, unordered
/// relative to the originating database write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusEvent {
    /// A notification was just created; subscribers recompute the target
    /// user's unread count and forward both to their local gateway.
    NotificationCreated { notification: Notification },
    /// Generic UI-refresh event for one or more rooms, bypassing the
    /// notification model.
    Emit {
        event: String,
        data: serde_json::Value,
        rooms: Vec<String>,
    },
}

/// Push subscription registered by a browser or device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSubscription {
    pub id: String,
    pub user_id: String,
    pub endpoint: String,
}

/// Minimal ticket view loaded through the [`Directory`](crate::traits::Directory) boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketInfo {
    pub id: String,
    pub subject: String,
    pub requester_id: String,
    pub assignee_id: Option<String>,
    pub status: String,
}

/// Tenant/store scope resolved for a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: String,
    pub store_id: String,
}

/// Key used to resolve a tenant context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextKey {
    User(String),
    Ticket(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn notification_kind_round_trips_through_strings() {
        for kind in NotificationKind::iter() {
            let s = kind.to_string();
            let parsed = NotificationKind::from_str(&s).expect("should parse back");
            assert_eq!(kind, parsed);
        }
        assert_eq!(
            NotificationKind::TicketStatusChanged.to_string(),
            "ticket-status-changed"
        );
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(NotificationKind::from_str("ticket-exploded").is_err());
    }

    #[test]
    fn urgent_kinds_bypass_quiet_hours() {
        assert!(NotificationKind::SlaBreach.is_urgent());
        assert!(NotificationKind::PriorityEscalation.is_urgent());
        assert!(!NotificationKind::TicketReply.is_urgent());
    }

    #[test]
    fn priority_orders_breach_above_assignment_above_social() {
        assert!(
            NotificationKind::SlaBreach.priority()
                > NotificationKind::TicketAssigned.priority()
        );
        assert!(
            NotificationKind::TicketAssigned.priority()
                > NotificationKind::SocialComment.priority()
        );
    }

    #[test]
    fn default_preference_gives_email_to_assignment_kinds_only() {
        let assigned = UserPreference::defaults_for("u1", NotificationKind::TicketAssigned);
        assert!(assigned.email);
        let mention = UserPreference::defaults_for("u1", NotificationKind::TicketMention);
        assert!(!mention.email);
        assert!(mention.in_app);
    }

    #[test]
    fn idempotency_key_is_deterministic() {
        let payload = JobPayload {
            notification_id: "n-1".into(),
            channel: DeliveryChannel::Email,
            user_id: "u-1".into(),
            recipient: Some("a@example.com".into()),
            title: "t".into(),
            body: "b".into(),
            link: None,
            threading: None,
            social: None,
        };
        assert_eq!(payload.idempotency_key(), "n-1:email");
    }

    #[test]
    fn identity_rooms_by_role() {
        let user = Identity {
            user_id: "7".into(),
            role: Role::User,
        };
        assert_eq!(user.rooms(), vec!["user:7".to_string()]);

        let admin = Identity {
            user_id: "1".into(),
            role: Role::Admin,
        };
        assert_eq!(
            admin.rooms(),
            vec!["user:1".to_string(), "agents".to_string(), "admins".to_string()]
        );
    }

    #[test]
    fn metadata_serializes_tagged() {
        let meta = NotificationMetadata::Reply {
            reply_content: "hi".into(),
            agent_name: "Ana".into(),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["type"], "reply");
        let back: NotificationMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn bus_event_round_trips() {
        let event = BusEvent::Emit {
            event: "ticket:created".into(),
            data: serde_json::json!({"ticket_id": "t-9"}),
            rooms: vec![rooms::AGENTS.to_string()],
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: BusEvent = serde_json::from_str(&json).unwrap();
        match back {
            BusEvent::Emit { rooms, .. } => assert_eq!(rooms, vec!["agents"]),
            _ => panic!("expected Emit"),
        }
    }
}
