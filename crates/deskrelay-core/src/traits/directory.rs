// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repository boundary to the helpdesk data store.
//!
//! The notification engine never traverses the helpdesk ORM directly;
//! everything it needs (recipient addresses, push subscriptions, ticket
//! context, tenant scope) comes through this trait.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::types::{ContextKey, PushSubscription, Role, TenantContext, TicketInfo};

/// Read-mostly view of the helpdesk data store.
#[async_trait]
pub trait Directory: Send + Sync + 'static {
    /// The user's email address, if any is on file.
    async fn user_email(&self, user_id: &str) -> Result<Option<String>, RelayError>;

    /// Active push subscriptions registered by the user's devices.
    async fn push_subscriptions(&self, user_id: &str)
        -> Result<Vec<PushSubscription>, RelayError>;

    /// Deactivates a push subscription whose endpoint is gone, so future
    /// notifications do not retry a dead endpoint.
    async fn deactivate_push_subscription(&self, subscription_id: &str)
        -> Result<(), RelayError>;

    /// The user's role for authorization checks.
    async fn role_of(&self, user_id: &str) -> Result<Role, RelayError>;

    /// Minimal ticket view for trigger handlers.
    async fn ticket(&self, ticket_id: &str) -> Result<Option<TicketInfo>, RelayError>;

    /// Resolves the tenant/store scope for a user or ticket.
    async fn resolve_tenant_context(&self, key: ContextKey)
        -> Result<TenantContext, RelayError>;
}
