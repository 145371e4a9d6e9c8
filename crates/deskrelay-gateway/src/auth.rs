// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication for the gateway.
//!
//! Two independent mechanisms:
//! 1. Bearer token middleware for the internal HTTP API
//!    (`Authorization: Bearer <token>`).
//! 2. HMAC identity tokens verified at the WebSocket handshake, resolving
//!    a connection to a user id and role.
//!
//! Both are fail-closed: with nothing configured, every request is
//! rejected.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use deskrelay_core::{Identity, RelayError, Role, TokenVerifier};

type HmacSha256 = Hmac<Sha256>;

/// Bearer-token configuration for the internal HTTP API.
#[derive(Clone)]
pub struct AuthConfig {
    /// Expected bearer token. `None` disables the API (fail-closed).
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

/// Middleware guarding the `/v1` routes with a bearer token.
///
/// With no token configured, all requests are rejected (fail-closed).
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(ref expected_token) = auth.bearer_token else {
        tracing::error!("gateway has no bearer token configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if auth_header == Some(expected_token.as_str()) {
        return Ok(next.run(request).await);
    }
    Err(StatusCode::UNAUTHORIZED)
}

/// HMAC-SHA256 identity-token verifier for the WebSocket handshake.
///
/// Token format: `<user_id>:<role>:<expiry>:<signature>` where `expiry`
/// is a unix timestamp in seconds and `signature` is the hex HMAC of
/// `<user_id>:<role>:<expiry>` under the shared secret. The helpdesk
/// issues these tokens when rendering the client page; the gateway only
/// verifies them.
pub struct HmacTokenVerifier {
    secret: Option<Vec<u8>>,
}

impl HmacTokenVerifier {
    /// `None` secret rejects every connection (fail-closed).
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            secret: secret.map(|s| s.as_bytes().to_vec()),
        }
    }

    /// Issues a signed token. Used by operator tooling and tests; the
    /// serve path never calls this.
    pub fn sign(
        secret: &str,
        user_id: &str,
        role: Role,
        expires_at_unix: i64,
    ) -> Result<String, RelayError> {
        let message = format!("{user_id}:{role}:{expires_at_unix}");
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| RelayError::Internal(format!("hmac key setup failed: {e}")))?;
        mac.update(message.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        Ok(format!("{message}:{signature}"))
    }
}

impl TokenVerifier for HmacTokenVerifier {
    fn verify(&self, token: &str) -> Result<Identity, RelayError> {
        let Some(ref secret) = self.secret else {
            return Err(RelayError::Unauthorized(
                "gateway has no token secret configured".into(),
            ));
        };

        // Parse from the right: user ids may themselves contain colons.
        let mut parts = token.rsplitn(4, ':');
        let (Some(signature), Some(expiry), Some(role), Some(user_id)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(RelayError::Unauthorized("malformed token".into()));
        };
        if user_id.is_empty() {
            return Err(RelayError::Unauthorized("malformed token".into()));
        }

        let message = format!("{user_id}:{role}:{expiry}");
        let mut mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| RelayError::Internal(format!("hmac key setup failed: {e}")))?;
        mac.update(message.as_bytes());
        let sig_bytes = hex::decode(signature)
            .map_err(|_| RelayError::Unauthorized("malformed token signature".into()))?;
        mac.verify_slice(&sig_bytes)
            .map_err(|_| RelayError::Unauthorized("invalid token signature".into()))?;

        // Only now trust the claims.
        let expires_at: i64 = expiry
            .parse()
            .map_err(|_| RelayError::Unauthorized("malformed token expiry".into()))?;
        if expires_at < chrono::Utc::now().timestamp() {
            return Err(RelayError::Unauthorized("token expired".into()));
        }
        let role: Role = role
            .parse()
            .map_err(|_| RelayError::Unauthorized(format!("unknown role {role}")))?;

        Ok(Identity {
            user_id: user_id.to_string(),
            role,
        })
    }
}
