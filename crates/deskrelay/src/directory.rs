// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP-backed [`Directory`] against the helpdesk's internal API.
//!
//! The engine never reads the helpdesk database; recipient addresses,
//! push subscriptions, roles, tickets, and tenant scope all come over
//! this client. Lookups are short-lived GETs with a configured timeout,
//! authenticated with a bearer API key.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use deskrelay_config::model::DirectoryConfig;
use deskrelay_core::{
    ContextKey, Directory, PushSubscription, RelayError, Role, TenantContext, TicketInfo,
};

pub struct HttpDirectory {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpDirectory {
    pub fn new(config: &DirectoryConfig) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RelayError::Config(format!("failed to build directory client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.get(format!("{}{path}", self.base_url));
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }
        request
    }

    /// Runs a GET, mapping 404 to `None` and other failures to errors.
    async fn fetch_optional<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, RelayError> {
        let response = self.get(path).send().await.map_err(wire_error)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status().map_err(wire_error)?;
        response.json::<T>().await.map(Some).map_err(wire_error)
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, RelayError> {
        self.fetch_optional(path)
            .await?
            .ok_or_else(|| RelayError::NotFound(format!("directory resource {path}")))
    }
}

fn wire_error(e: reqwest::Error) -> RelayError {
    RelayError::Storage {
        source: Box::new(e),
    }
}

#[derive(Debug, Deserialize)]
struct EmailBody {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionsBody {
    subscriptions: Vec<PushSubscription>,
}

#[derive(Debug, Deserialize)]
struct RoleBody {
    role: Role,
}

#[async_trait]
impl Directory for HttpDirectory {
    async fn user_email(&self, user_id: &str) -> Result<Option<String>, RelayError> {
        let body: Option<EmailBody> = self
            .fetch_optional(&format!("/users/{user_id}/email"))
            .await?;
        Ok(body.and_then(|b| b.email))
    }

    async fn push_subscriptions(
        &self,
        user_id: &str,
    ) -> Result<Vec<PushSubscription>, RelayError> {
        let body: Option<SubscriptionsBody> = self
            .fetch_optional(&format!("/users/{user_id}/push-subscriptions"))
            .await?;
        Ok(body.map(|b| b.subscriptions).unwrap_or_default())
    }

    async fn deactivate_push_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<(), RelayError> {
        let mut request = self.client.delete(format!(
            "{}/push-subscriptions/{subscription_id}",
            self.base_url
        ));
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }
        request
            .send()
            .await
            .map_err(wire_error)?
            .error_for_status()
            .map_err(wire_error)?;
        Ok(())
    }

    async fn role_of(&self, user_id: &str) -> Result<Role, RelayError> {
        let body: RoleBody = self.fetch(&format!("/users/{user_id}/role")).await?;
        Ok(body.role)
    }

    async fn ticket(&self, ticket_id: &str) -> Result<Option<TicketInfo>, RelayError> {
        self.fetch_optional(&format!("/tickets/{ticket_id}")).await
    }

    async fn resolve_tenant_context(&self, key: ContextKey) -> Result<TenantContext, RelayError> {
        let path = match key {
            ContextKey::User(user_id) => format!("/context/user/{user_id}"),
            ContextKey::Ticket(ticket_id) => format!("/context/ticket/{ticket_id}"),
        };
        self.fetch(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::{Json, Router};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn directory(base_url: String) -> HttpDirectory {
        HttpDirectory::new(&DirectoryConfig {
            base_url,
            api_key: None,
            timeout_secs: 2,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn email_lookup_unwraps_the_body() {
        let app = Router::new().route(
            "/users/{id}/email",
            get(|| async { Json(serde_json::json!({"email": "u1@example.com"})) }),
        );
        let dir = directory(serve(app).await);
        assert_eq!(
            dir.user_email("u-1").await.unwrap().as_deref(),
            Some("u1@example.com")
        );
    }

    #[tokio::test]
    async fn unknown_user_email_is_none_not_an_error() {
        let app = Router::new();
        let dir = directory(serve(app).await);
        assert!(dir.user_email("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn role_lookup_parses_lowercase_roles() {
        let app = Router::new().route(
            "/users/{id}/role",
            get(|| async { Json(serde_json::json!({"role": "admin"})) }),
        );
        let dir = directory(serve(app).await);
        assert_eq!(dir.role_of("u-1").await.unwrap(), Role::Admin);
    }

    #[tokio::test]
    async fn missing_ticket_is_none() {
        let app = Router::new();
        let dir = directory(serve(app).await);
        assert!(dir.ticket("t-404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tenant_context_resolves_by_user() {
        let app = Router::new().route(
            "/context/user/{id}",
            get(|| async { Json(serde_json::json!({"tenant_id": "t-1", "store_id": "s-1"})) }),
        );
        let dir = directory(serve(app).await);
        let ctx = dir
            .resolve_tenant_context(ContextKey::User("u-1".into()))
            .await
            .unwrap();
        assert_eq!(ctx.tenant_id, "t-1");
        assert_eq!(ctx.store_id, "s-1");
    }
}
