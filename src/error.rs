//! Unified error model for the console gate.
//! Session, catalog, routing and transport failures share one enum so the guard
//! and the visibility layer can fold any of them into a fail-closed decision.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GateError {
    /// Login rejected by the backend. `message` is what the login form shows.
    #[error("{message}")]
    Authentication { status: Option<u16>, message: String },
    /// Stored token present but rejected on validation.
    #[error("session expired: {message}")]
    SessionExpired { message: String },
    #[error("permission load failed: {message}")]
    PermissionLoad { message: String },
    #[error("storage error: {message}")]
    Storage { message: String },
    #[error("transport error: {message}")]
    Transport { message: String },
    #[error("no route matches {target}")]
    RouteNotFound { target: String },
    #[error("timed out: {message}")]
    Timeout { message: String },
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl GateError {
    pub fn code_str(&self) -> &'static str {
        match self {
            GateError::Authentication { .. } => "authentication_failed",
            GateError::SessionExpired { .. } => "session_expired",
            GateError::PermissionLoad { .. } => "permission_load_failed",
            GateError::Storage { .. } => "storage_error",
            GateError::Transport { .. } => "transport_error",
            GateError::RouteNotFound { .. } => "route_not_found",
            GateError::Timeout { .. } => "timeout",
            GateError::Configuration { .. } => "configuration_error",
        }
    }

    pub fn authentication<S: Into<String>>(status: Option<u16>, msg: S) -> Self { GateError::Authentication { status, message: msg.into() } }
    pub fn session_expired<S: Into<String>>(msg: S) -> Self { GateError::SessionExpired { message: msg.into() } }
    pub fn permission_load<S: Into<String>>(msg: S) -> Self { GateError::PermissionLoad { message: msg.into() } }
    pub fn storage<S: Into<String>>(msg: S) -> Self { GateError::Storage { message: msg.into() } }
    pub fn transport<S: Into<String>>(msg: S) -> Self { GateError::Transport { message: msg.into() } }
    pub fn route_not_found<S: Into<String>>(target: S) -> Self { GateError::RouteNotFound { target: target.into() } }
    pub fn timeout<S: Into<String>>(msg: S) -> Self { GateError::Timeout { message: msg.into() } }
    pub fn configuration<S: Into<String>>(msg: S) -> Self { GateError::Configuration { message: msg.into() } }

    /// Errors that mean "you are not logged in" rather than "something broke".
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, GateError::Authentication { .. } | GateError::SessionExpired { .. })
    }

    /// Re-tag any failure raised while fetching the catalog so callers see a single kind.
    pub fn into_permission_load(self) -> Self {
        match self {
            GateError::PermissionLoad { .. } => self,
            other => GateError::PermissionLoad { message: other.to_string() },
        }
    }
}

pub type GateResult<T> = Result<T, GateError>;

impl From<std::io::Error> for GateError {
    fn from(err: std::io::Error) -> Self { GateError::Storage { message: err.to_string() } }
}

impl From<serde_json::Error> for GateError {
    fn from(err: serde_json::Error) -> Self { GateError::Storage { message: format!("invalid JSON: {}", err) } }
}

impl From<reqwest::Error> for GateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GateError::Timeout { message: err.to_string() }
        } else {
            GateError::Transport { message: err.to_string() }
        }
    }
}
