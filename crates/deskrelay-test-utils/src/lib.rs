// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for deskrelay integration tests.
//!
//! Provides mock adapters and a temp-database harness for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockTransport`] - scripted channel transport with delivery capture
//! - [`MockLivePush`] - live-push sink that records instead of delivering
//! - [`StaticDirectory`] - in-memory helpdesk directory seeded from fixtures
//! - [`TestDb`] - migrated throwaway SQLite database

pub mod harness;
pub mod mock_live;
pub mod mock_transport;
pub mod static_directory;

pub use harness::TestDb;
pub use mock_live::MockLivePush;
pub use mock_transport::MockTransport;
pub use static_directory::StaticDirectory;
