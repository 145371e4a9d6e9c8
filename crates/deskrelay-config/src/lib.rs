// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the deskrelay notification engine.
//!
//! Layered loading (compiled defaults, system/XDG/local TOML, `DESKRELAY_`
//! environment variables) via Figment, with `deny_unknown_fields` models.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::RelayConfig;
