//! Runtime configuration, read from `CONSOLE_GATE_*` environment variables.
//! Every knob has a default so an unset environment yields a usable local setup.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{GateError, GateResult};

/// Logical names of the routes the guard redirects to. Paths stay owned by the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteNames {
    pub login: String,
    pub unauthorized: String,
    pub landing: String,
}

impl Default for RouteNames {
    fn default() -> Self {
        Self { login: "Login".into(), unauthorized: "Unauthorized".into(), landing: "Dashboard".into() }
    }
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Base URL of the records backend, e.g. `http://127.0.0.1:8080/api`.
    pub api_base_url: String,
    /// Directory holding the persisted `authToken` / `authUser` entries.
    pub state_dir: PathBuf,
    /// Ask the backend to validate a restored token during `check_auth`.
    pub validate_token_on_restore: bool,
    pub permission_timeout: Option<Duration>,
    pub init_timeout: Option<Duration>,
    /// Verdict of `has_any_permission(&[])`. Default deny.
    pub empty_any_allows: bool,
    /// Emit LOGIN/LOGOUT activity events to the backend.
    pub audit: bool,
    pub routes: RouteNames,
    pub max_redirects: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080/api".into(),
            state_dir: PathBuf::from(".console-gate"),
            validate_token_on_restore: false,
            permission_timeout: Some(Duration::from_millis(15_000)),
            init_timeout: None,
            empty_any_allows: false,
            audit: true,
            routes: RouteNames::default(),
            max_redirects: 8,
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| { let v = v.trim(); v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") })
        .unwrap_or(default)
}

// 0 disables the timeout
fn env_millis(name: &str, default: Option<Duration>) -> Option<Duration> {
    match std::env::var(name).ok().and_then(|s| s.trim().parse::<u64>().ok()) {
        Some(0) => None,
        Some(ms) => Some(Duration::from_millis(ms)),
        None => default,
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl GateConfig {
    pub fn from_env() -> GateResult<Self> {
        let d = GateConfig::default();
        let cfg = GateConfig {
            api_base_url: env_string("CONSOLE_GATE_API_BASE_URL").unwrap_or(d.api_base_url),
            state_dir: env_string("CONSOLE_GATE_STATE_DIR").map(PathBuf::from).unwrap_or(d.state_dir),
            validate_token_on_restore: env_flag("CONSOLE_GATE_VALIDATE_TOKEN", d.validate_token_on_restore),
            permission_timeout: env_millis("CONSOLE_GATE_PERMISSION_TIMEOUT_MS", d.permission_timeout),
            init_timeout: env_millis("CONSOLE_GATE_INIT_TIMEOUT_MS", d.init_timeout),
            empty_any_allows: env_flag("CONSOLE_GATE_EMPTY_ANY_ALLOWS", d.empty_any_allows),
            audit: env_flag("CONSOLE_GATE_AUDIT", d.audit),
            routes: RouteNames {
                login: env_string("CONSOLE_GATE_LOGIN_ROUTE").unwrap_or(d.routes.login),
                unauthorized: env_string("CONSOLE_GATE_UNAUTHORIZED_ROUTE").unwrap_or(d.routes.unauthorized),
                landing: env_string("CONSOLE_GATE_LANDING_ROUTE").unwrap_or(d.routes.landing),
            },
            max_redirects: std::env::var("CONSOLE_GATE_MAX_REDIRECTS").ok().and_then(|s| s.parse::<usize>().ok()).unwrap_or(d.max_redirects),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> GateResult<()> {
        let url = reqwest::Url::parse(&self.api_base_url)
            .map_err(|e| GateError::configuration(format!("invalid api base url '{}': {}", self.api_base_url, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(GateError::configuration(format!("unsupported scheme '{}' in api base url", url.scheme())));
        }
        if self.max_redirects == 0 {
            return Err(GateError::configuration("max_redirects must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = GateConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(!cfg.empty_any_allows);
        assert_eq!(cfg.routes.login, "Login");
        assert_eq!(cfg.routes.unauthorized, "Unauthorized");
        assert_eq!(cfg.routes.landing, "Dashboard");
    }

    #[test]
    fn rejects_bad_base_url() {
        let cfg = GateConfig { api_base_url: "not a url".into(), ..GateConfig::default() };
        assert_eq!(cfg.validate().unwrap_err().code_str(), "configuration_error");
        let cfg = GateConfig { api_base_url: "ftp://host/api".into(), ..GateConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_redirects() {
        let cfg = GateConfig { max_redirects: 0, ..GateConfig::default() };
        assert!(cfg.validate().is_err());
    }
}
