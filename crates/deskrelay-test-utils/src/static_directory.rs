// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory Directory implementation seeded from test fixtures.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use deskrelay_core::{
    ContextKey, Directory, PushSubscription, RelayError, Role, TenantContext, TicketInfo,
};

/// Seeded, mutable-in-tests directory.
pub struct StaticDirectory {
    emails: Mutex<HashMap<String, String>>,
    subscriptions: Mutex<Vec<PushSubscription>>,
    deactivated: Mutex<Vec<String>>,
    roles: Mutex<HashMap<String, Role>>,
    tickets: Mutex<HashMap<String, TicketInfo>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self {
            emails: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(Vec::new()),
            deactivated: Mutex::new(Vec::new()),
            roles: Mutex::new(HashMap::new()),
            tickets: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_email(self, user_id: &str, email: &str) -> Self {
        self.emails
            .lock()
            .unwrap()
            .insert(user_id.to_string(), email.to_string());
        self
    }

    pub fn with_subscription(self, subscription: PushSubscription) -> Self {
        self.subscriptions.lock().unwrap().push(subscription);
        self
    }

    pub fn with_role(self, user_id: &str, role: Role) -> Self {
        self.roles
            .lock()
            .unwrap()
            .insert(user_id.to_string(), role);
        self
    }

    pub fn with_ticket(self, ticket: TicketInfo) -> Self {
        self.tickets
            .lock()
            .unwrap()
            .insert(ticket.id.clone(), ticket);
        self
    }

    /// Subscription ids deactivated through the trait, in order.
    pub fn deactivated(&self) -> Vec<String> {
        self.deactivated.lock().unwrap().clone()
    }
}

impl Default for StaticDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn user_email(&self, user_id: &str) -> Result<Option<String>, RelayError> {
        Ok(self.emails.lock().unwrap().get(user_id).cloned())
    }

    async fn push_subscriptions(
        &self,
        user_id: &str,
    ) -> Result<Vec<PushSubscription>, RelayError> {
        let deactivated = self.deactivated.lock().unwrap();
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.user_id == user_id && !deactivated.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn deactivate_push_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<(), RelayError> {
        self.deactivated
            .lock()
            .unwrap()
            .push(subscription_id.to_string());
        Ok(())
    }

    async fn role_of(&self, user_id: &str) -> Result<Role, RelayError> {
        Ok(self
            .roles
            .lock()
            .unwrap()
            .get(user_id)
            .copied()
            .unwrap_or(Role::User))
    }

    async fn ticket(&self, ticket_id: &str) -> Result<Option<TicketInfo>, RelayError> {
        Ok(self.tickets.lock().unwrap().get(ticket_id).cloned())
    }

    async fn resolve_tenant_context(
        &self,
        _key: ContextKey,
    ) -> Result<TenantContext, RelayError> {
        Ok(TenantContext {
            tenant_id: "tenant-test".into(),
            store_id: "store-test".into(),
        })
    }
}
