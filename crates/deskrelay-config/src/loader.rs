// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./deskrelay.toml` > `~/.config/deskrelay/deskrelay.toml`
//! > `/etc/deskrelay/deskrelay.toml` with environment variable overrides via
//! `DESKRELAY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::RelayConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/deskrelay/deskrelay.toml` (system-wide)
/// 3. `~/.config/deskrelay/deskrelay.toml` (user XDG config)
/// 4. `./deskrelay.toml` (local directory)
/// 5. `DESKRELAY_*` environment variables
pub fn load_config() -> Result<RelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RelayConfig::default()))
        .merge(Toml::file("/etc/deskrelay/deskrelay.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("deskrelay/deskrelay.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("deskrelay.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<RelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RelayConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RelayConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `DESKRELAY_EMAIL_SMTP_HOST` must map to
/// `email.smtp_host`, not `email.smtp.host`.
fn env_provider() -> Env {
    Env::prefixed("DESKRELAY_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("engine_", "engine.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("bus_", "bus.", 1)
            .replacen("gateway_", "gateway.", 1)
            .replacen("email_", "email.", 1)
            .replacen("push_", "push.", 1)
            .replacen("social_", "social.", 1)
            .replacen("workers_", "workers.", 1)
            .replacen("digest_", "digest.", 1)
            .replacen("dedup_", "dedup.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_any_file() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.engine.name, "deskrelay");
        assert_eq!(config.workers.email_concurrency, 5);
        assert_eq!(config.workers.push_concurrency, 10);
        assert_eq!(config.workers.email_max_attempts, 3);
        assert_eq!(config.workers.social_max_attempts, 2);
        assert_eq!(config.dedup.social_window_secs, 300);
        assert!(config.gateway.token_secret.is_none());
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = load_config_from_str(
            r#"
            [gateway]
            port = 9000
            bearer_token = "internal-secret"

            [workers]
            backoff_base_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.bearer_token.as_deref(), Some("internal-secret"));
        assert_eq!(config.workers.backoff_base_secs, 5);
        // Untouched sections keep defaults.
        assert_eq!(config.email.smtp_port, 587);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = load_config_from_str(
            r#"
            [engine]
            naem = "typo"
            "#,
        );
        assert!(result.is_err(), "unknown key should be rejected");
    }

    #[test]
    fn bus_relay_mode_parses() {
        let config = load_config_from_str(
            r#"
            [bus]
            mode = "relay"
            relay_url = "ws://bus.internal:7474/bus"
            "#,
        )
        .unwrap();
        assert_eq!(config.bus.mode, "relay");
        assert_eq!(
            config.bus.relay_url.as_deref(),
            Some("ws://bus.internal:7474/bus")
        );
    }
}
