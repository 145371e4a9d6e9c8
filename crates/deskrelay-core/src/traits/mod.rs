// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the deskrelay engine.
//!
//! All adapters extend the [`RelayAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod auth;
pub mod bus;
pub mod directory;
pub mod live;
pub mod transport;

pub use adapter::RelayAdapter;
pub use auth::TokenVerifier;
pub use bus::NotificationBus;
pub use directory::Directory;
pub use live::LivePush;
pub use transport::Transport;
