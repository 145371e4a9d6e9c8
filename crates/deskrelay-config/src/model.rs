// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the deskrelay notification engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level deskrelay configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Engine identity and logging settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Publish/subscribe bus settings.
    #[serde(default)]
    pub bus: BusConfig,

    /// Realtime gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Email transport settings.
    #[serde(default)]
    pub email: EmailConfig,

    /// Push transport settings.
    #[serde(default)]
    pub push: PushConfig,

    /// Social transport settings.
    #[serde(default)]
    pub social: SocialConfig,

    /// Worker pool and retry settings.
    #[serde(default)]
    pub workers: WorkerConfig,

    /// Digest aggregator settings.
    #[serde(default)]
    pub digest: DigestConfig,

    /// Duplicate-detection settings for social events.
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Helpdesk directory API settings.
    #[serde(default)]
    pub directory: DirectoryConfig,
}

/// Engine identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Display name of this engine instance.
    #[serde(default = "default_engine_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Base URL used to build deep links into the helpdesk UI.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: default_engine_name(),
            log_level: default_log_level(),
            base_url: default_base_url(),
        }
    }
}

fn default_engine_name() -> String {
    "deskrelay".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("deskrelay").join("deskrelay.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("deskrelay.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Publish/subscribe bus configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Bus mode: "local" (single process) or "relay" (WebSocket relay).
    #[serde(default = "default_bus_mode")]
    pub mode: String,

    /// Relay endpoint for "relay" mode, e.g. `ws://bus.internal:7474/bus`.
    #[serde(default)]
    pub relay_url: Option<String>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            mode: default_bus_mode(),
            relay_url: None,
        }
    }
}

fn default_bus_mode() -> String {
    "local".to_string()
}

/// Realtime gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token for the internal HTTP API. `None` disables the API
    /// (fail-closed).
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Secret for HMAC identity-token verification at the WS handshake.
    /// `None` rejects every connection (fail-closed).
    #[serde(default)]
    pub token_secret: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
            token_secret: None,
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    7470
}

/// Email transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    /// Enable the email channel.
    #[serde(default = "default_email_enabled")]
    pub enabled: bool,

    /// SMTP relay hostname.
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    /// SMTP relay port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// From address on outbound mail.
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// SMTP username. `None` sends unauthenticated.
    #[serde(default)]
    pub username: Option<String>,

    /// SMTP password.
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: default_email_enabled(),
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            from_address: default_from_address(),
            username: None,
            password: None,
        }
    }
}

fn default_email_enabled() -> bool {
    true
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "support@localhost".to_string()
}

/// Push transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PushConfig {
    /// Enable the push channel.
    #[serde(default = "default_push_enabled")]
    pub enabled: bool,

    /// Seconds before an in-flight push HTTP request times out.
    #[serde(default = "default_push_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: default_push_enabled(),
            timeout_secs: default_push_timeout_secs(),
        }
    }
}

fn default_push_enabled() -> bool {
    true
}

fn default_push_timeout_secs() -> u64 {
    10
}

/// Social transport configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SocialConfig {
    /// Outbound webhook for social replies. `None` disables the channel.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Worker pool sizing and retry policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Concurrent email workers.
    #[serde(default = "default_email_concurrency")]
    pub email_concurrency: usize,

    /// Concurrent push workers.
    #[serde(default = "default_push_concurrency")]
    pub push_concurrency: usize,

    /// Concurrent social workers.
    #[serde(default = "default_social_concurrency")]
    pub social_concurrency: usize,

    /// Attempt budget for email jobs.
    #[serde(default = "default_email_max_attempts")]
    pub email_max_attempts: i32,

    /// Attempt budget for push jobs.
    #[serde(default = "default_push_max_attempts")]
    pub push_max_attempts: i32,

    /// Attempt budget for social jobs.
    #[serde(default = "default_social_max_attempts")]
    pub social_max_attempts: i32,

    /// Base delay for exponential retry backoff, in seconds.
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,

    /// Idle poll interval for workers when their queue is empty.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            email_concurrency: default_email_concurrency(),
            push_concurrency: default_push_concurrency(),
            social_concurrency: default_social_concurrency(),
            email_max_attempts: default_email_max_attempts(),
            push_max_attempts: default_push_max_attempts(),
            social_max_attempts: default_social_max_attempts(),
            backoff_base_secs: default_backoff_base_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_email_concurrency() -> usize {
    5
}

fn default_push_concurrency() -> usize {
    10
}

fn default_social_concurrency() -> usize {
    2
}

fn default_email_max_attempts() -> i32 {
    3
}

fn default_push_max_attempts() -> i32 {
    3
}

fn default_social_max_attempts() -> i32 {
    2
}

fn default_backoff_base_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// Digest aggregator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DigestConfig {
    /// How often the aggregator checks for due digest batches.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: default_flush_interval_secs(),
        }
    }
}

fn default_flush_interval_secs() -> u64 {
    60
}

/// Duplicate-detection configuration for social events.
///
/// The window and matching rule are product decisions, not invariants, so
/// they are parameterized rather than hard-coded.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DedupConfig {
    /// Seconds within which a repeated social event for the same
    /// (user, kind, entity) is treated as a duplicate.
    #[serde(default = "default_social_window_secs")]
    pub social_window_secs: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            social_window_secs: default_social_window_secs(),
        }
    }
}

fn default_social_window_secs() -> u64 {
    300
}

/// Helpdesk directory API configuration.
///
/// The engine resolves recipient addresses, push subscriptions, roles,
/// and ticket context through the helpdesk's internal HTTP API rather
/// than reading its database directly.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DirectoryConfig {
    /// Base URL of the helpdesk internal API.
    #[serde(default = "default_directory_base_url")]
    pub base_url: String,

    /// API key sent as a bearer token. `None` sends unauthenticated.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Seconds before a directory lookup times out.
    #[serde(default = "default_directory_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: default_directory_base_url(),
            api_key: None,
            timeout_secs: default_directory_timeout_secs(),
        }
    }
}

fn default_directory_base_url() -> String {
    "http://localhost:3000/internal".to_string()
}

fn default_directory_timeout_secs() -> u64 {
    5
}
