// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the deskrelay notification engine.

use thiserror::Error;

/// The primary error type used across all deskrelay adapter traits and core operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Input validation errors (missing required field, unknown notification kind).
    /// Rejected synchronously to the caller, never recorded in the delivery log.
    #[error("validation error: {0}")]
    Validation(String),

    /// Caller is not allowed to perform the operation. Distinct from
    /// [`RelayError::NotFound`] so clients can tell "someone else's
    /// notification" apart from "no such notification".
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Channel transport errors (SMTP rejection, expired push subscription,
    /// missing recipient address). Isolated per channel and recorded in the
    /// delivery log; never propagated to the event producer.
    #[error("transport error on {channel}: {message}")]
    Transport {
        channel: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Publish/subscribe bus errors (relay unreachable, connection dropped).
    #[error("bus error: {message}")]
    Bus {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Shorthand for a transport error without an underlying source.
    pub fn transport(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            channel: channel.into(),
            message: message.into(),
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_and_not_found_are_distinct() {
        let unauthorized = RelayError::Unauthorized("notif-1".into());
        let not_found = RelayError::NotFound("notif-1".into());
        assert!(matches!(unauthorized, RelayError::Unauthorized(_)));
        assert!(matches!(not_found, RelayError::NotFound(_)));
        assert_ne!(unauthorized.to_string(), not_found.to_string());
    }

    #[test]
    fn transport_shorthand_formats_channel() {
        let err = RelayError::transport("email", "no email address");
        assert_eq!(
            err.to_string(),
            "transport error on email: no email address"
        );
    }
}
