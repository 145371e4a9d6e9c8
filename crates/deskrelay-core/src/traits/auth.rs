// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity-token verification trait used at the gateway handshake.

use crate::error::RelayError;
use crate::types::Identity;

/// Verifies a caller-supplied identity token and resolves it to a user id
/// and role. Verification is synchronous and cheap; it runs once per
/// connection before the socket is accepted.
pub trait TokenVerifier: Send + Sync + 'static {
    /// Returns the verified identity, or [`RelayError::Unauthorized`] for
    /// malformed, forged, or expired tokens.
    fn verify(&self, token: &str) -> Result<Identity, RelayError>;
}
