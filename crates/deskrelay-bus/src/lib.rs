// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publish/subscribe bus adapters for the deskrelay notification engine.
//!
//! Two implementations of [`deskrelay_core::NotificationBus`]: [`LocalBus`]
//! for single-process deployments and [`RelayBus`] for fleets sharing an
//! external WebSocket relay.

pub mod local;
pub mod relay;

pub use local::LocalBus;
pub use relay::RelayBus;
