use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::principal::{EntityId, LoginReply};
use crate::error::GateResult;

#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new<S: Into<String>>(username: S, password: S) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

// Keep the password out of logs
impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest").field("username", &self.username).field("password", &"<redacted>").finish()
    }
}

/// Entry of `GET /roles?name=X`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSummary {
    pub id: EntityId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    #[serde(default)]
    pub id: Option<EntityId>,
    pub name: String,
}

/// Body of `GET /roles/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDetail {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<PermissionRecord>,
}

/// Authentication side of the records backend.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn login(&self, req: &LoginRequest) -> GateResult<LoginReply>;
    /// `Err(SessionExpired)` when the backend rejects the token.
    async fn validate_token(&self, token: &str) -> GateResult<()>;
}

/// Role lookups the permission catalog needs.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn find_roles_by_name(&self, name: &str) -> GateResult<Vec<RoleSummary>>;
    async fn fetch_role(&self, id: &EntityId) -> GateResult<RoleDetail>;
}
