//! HTTP client for the records backend.
//!
//! Implements the collaborator traits the session, catalog and audit layers consume.
//! The bearer token is read from session storage on every request, so a login or
//! logout is picked up without rebuilding the client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{GateError, GateResult};
use crate::identity::{
    ActivityEvent, AuditSink, AuthProvider, EntityId, LoginReply, LoginRequest, RoleDetail, RoleDirectory, RoleSummary,
    SessionStorage, AUTH_TOKEN_KEY,
};

#[derive(Clone)]
pub struct RestClient {
    base: Url,
    client: reqwest::Client,
    storage: Arc<dyn SessionStorage>,
}

impl RestClient {
    pub fn new(base: &str, storage: Arc<dyn SessionStorage>) -> GateResult<Self> {
        // keep the base path when joining relative endpoints
        let normalized = if base.ends_with('/') { base.to_string() } else { format!("{}/", base) };
        let base = Url::parse(&normalized).map_err(|e| GateError::configuration(format!("invalid api base url '{}': {}", base, e)))?;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GateError::configuration(format!("http client: {}", e)))?;
        Ok(Self { base, client, storage })
    }

    pub fn base(&self) -> &Url { &self.base }

    fn url(&self, path: &str) -> GateResult<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| GateError::configuration(format!("bad endpoint '{}': {}", path, e)))
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match self.storage.get(AUTH_TOKEN_KEY) {
            Ok(Some(token)) if !token.is_empty() => req.bearer_auth(token),
            Ok(_) => req,
            Err(e) => {
                warn!(target: "api", error = %e, "could not read stored token; sending unauthenticated request");
                req
            }
        }
    }

    async fn json<T: DeserializeOwned>(resp: Response) -> GateResult<T> {
        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| GateError::transport(format!("unexpected response body: {}", e)))
    }
}

/// Best message from an error response: JSON `message`, then `error`, then the raw text,
/// then `Error {status}: {reason}`.
pub async fn error_message(resp: Response) -> (StatusCode, String) {
    let status = resp.status();
    let fallback = format!("Error {}: {}", status.as_u16(), status.canonical_reason().unwrap_or("Unknown"));
    let text = resp.text().await.unwrap_or_default();
    (status, message_from_body(&text).unwrap_or(fallback))
}

fn message_from_body(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        for key in ["message", "error"] {
            if let Some(s) = v.get(key).and_then(|m| m.as_str()).filter(|s| !s.is_empty()) {
                return Some(s.to_string());
            }
        }
        if v.is_object() {
            return None;
        }
    }
    Some(trimmed.to_string())
}

#[async_trait]
impl AuthProvider for RestClient {
    async fn login(&self, req: &LoginRequest) -> GateResult<LoginReply> {
        let url = self.url("auth/login")?;
        debug!(target: "api", %url, username = %req.username, "POST login");
        let resp = self.client.post(url).json(req).send().await?;
        if !resp.status().is_success() {
            let (status, message) = error_message(resp).await;
            return Err(GateError::authentication(Some(status.as_u16()), message));
        }
        Self::json(resp).await
    }

    async fn validate_token(&self, token: &str) -> GateResult<()> {
        let url = self.url("auth/validate-token")?;
        let resp = self.client.get(url).bearer_auth(token).send().await?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let (_, message) = error_message(resp).await;
                Err(GateError::session_expired(message))
            }
            _ => {
                let (_, message) = error_message(resp).await;
                Err(GateError::transport(message))
            }
        }
    }
}

#[async_trait]
impl RoleDirectory for RestClient {
    async fn find_roles_by_name(&self, name: &str) -> GateResult<Vec<RoleSummary>> {
        let mut url = self.url("roles")?;
        url.query_pairs_mut().append_pair("name", name);
        debug!(target: "api", %url, "GET roles by name");
        let resp = self.authorized(self.client.get(url)).send().await?;
        if !resp.status().is_success() {
            let (_, message) = error_message(resp).await;
            return Err(GateError::transport(message));
        }
        Self::json(resp).await
    }

    async fn fetch_role(&self, id: &EntityId) -> GateResult<RoleDetail> {
        let url = self.url(&format!("roles/{}", urlencoding::encode(&id.to_string())))?;
        debug!(target: "api", %url, "GET role");
        let resp = self.authorized(self.client.get(url)).send().await?;
        if !resp.status().is_success() {
            let (_, message) = error_message(resp).await;
            return Err(GateError::transport(message));
        }
        Self::json(resp).await
    }
}

#[async_trait]
impl AuditSink for RestClient {
    async fn record(&self, event: &ActivityEvent) -> GateResult<()> {
        let url = self.url("activity-logs")?;
        let resp = self.authorized(self.client.post(url)).json(event).send().await?;
        if !resp.status().is_success() {
            let (_, message) = error_message(resp).await;
            return Err(GateError::transport(message));
        }
        Ok(())
    }
}
