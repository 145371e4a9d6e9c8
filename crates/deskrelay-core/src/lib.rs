// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the deskrelay notification engine.
//!
//! This crate provides the foundational trait definitions, error types, and
//! domain types used throughout the deskrelay workspace: notification and
//! delivery-log models, the channel/job vocabulary, and the adapter seams
//! (transports, bus, live push, directory, token verification).

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::RelayError;
pub use types::{
    events, rooms, AdapterType, BusEvent, ContextKey, DeliveryChannel, DeliveryLogEntry,
    DeliveryStatus, DigestMode, EmailThreading, HealthStatus, Identity, JobPayload, LiveEvent,
    Notification, NotificationKind, NotificationMetadata, PushSubscription, Role, SocialPayload,
    TenantContext, TicketInfo, TransportReceipt, UserPreference,
};

pub use traits::{Directory, LivePush, NotificationBus, RelayAdapter, TokenVerifier, Transport};
