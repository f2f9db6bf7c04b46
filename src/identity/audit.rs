use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GateResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityAction {
    Login,
    Logout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub action: ActivityAction,
    pub description: String,
    #[serde(default)]
    pub username: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn login(username: &str) -> Self {
        ActivityEvent { action: ActivityAction::Login, description: "Successful login".into(), username: Some(username.to_string()), timestamp: Utc::now() }
    }

    pub fn logout(username: Option<&str>) -> Self {
        ActivityEvent { action: ActivityAction::Logout, description: "Manual logout".into(), username: username.map(str::to_string), timestamp: Utc::now() }
    }
}

/// Receiver of activity-log events. Failures are logged by callers, never surfaced to the user.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &ActivityEvent) -> GateResult<()>;
}

pub struct NoopAudit;

#[async_trait]
impl AuditSink for NoopAudit {
    async fn record(&self, _event: &ActivityEvent) -> GateResult<()> { Ok(()) }
}
