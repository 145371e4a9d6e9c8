// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification orchestration for the deskrelay engine.
//!
//! The [`NotificationService`] turns domain events into per-user
//! notifications, fans them out to routed channels, and mirrors them to
//! live connections through the bus subscriber loop. The
//! [`DigestScheduler`] batches deferred email into periodic summaries.

pub mod digest;
pub mod dispatch;
pub mod service;
pub mod subscriber;
pub mod triggers;

pub use digest::DigestScheduler;
pub use service::{CreateNotification, NotificationPage, NotificationService};
pub use subscriber::run_subscriber;
