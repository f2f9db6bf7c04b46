//! Session state: token + user profile restored from persisted storage.
//!
//! The store starts uninitialized. The first `check_auth` or `login` to finish flips
//! `initialized` to true and releases every `wait_initialized` caller; it never flips back.
//! `generation` advances whenever the signed-in identity changes, so state derived from one
//! session (the permission catalog) can tell it no longer applies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::audit::{ActivityEvent, AuditSink};
use super::principal::UserProfile;
use super::provider::{AuthProvider, LoginRequest};
use super::storage::{SessionStorage, AUTH_TOKEN_KEY, AUTH_USER_KEY};
use crate::error::{GateError, GateResult};

/// Immutable copy of the session handed to evaluators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub token: Option<String>,
    pub user: Option<UserProfile>,
    pub initialized: bool,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool { self.token.is_some() }

    pub fn role_name(&self) -> Option<&str> { self.user.as_ref().and_then(|u| u.role_name()) }

    pub fn username(&self) -> Option<&str> { self.user.as_ref().map(|u| u.username.as_str()) }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    pub validate_token_on_restore: bool,
    pub audit: bool,
}

pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    provider: Arc<dyn AuthProvider>,
    audit: Arc<dyn AuditSink>,
    opts: SessionOptions,
    state: RwLock<SessionState>,
    generation: AtomicU64,
    init_tx: watch::Sender<bool>,
}

impl SessionStore {
    pub fn new(
        storage: Arc<dyn SessionStorage>,
        provider: Arc<dyn AuthProvider>,
        audit: Arc<dyn AuditSink>,
        opts: SessionOptions,
    ) -> Self {
        let (init_tx, _) = watch::channel(false);
        Self { storage, provider, audit, opts, state: RwLock::new(SessionState::default()), generation: AtomicU64::new(0), init_tx }
    }

    pub fn snapshot(&self) -> SessionState { self.state.read().clone() }
    pub fn is_initialized(&self) -> bool { self.state.read().initialized }
    pub fn is_authenticated(&self) -> bool { self.state.read().is_authenticated() }
    pub fn generation(&self) -> u64 { self.generation.load(Ordering::SeqCst) }

    /// Resolves once the session has been initialized; immediately if it already is.
    pub async fn wait_initialized(&self) {
        let mut rx = self.init_tx.subscribe();
        // the sender lives in self, so the channel cannot close while we borrow it
        let _ = rx.wait_for(|ready| *ready).await;
    }

    fn mark_initialized(&self) {
        self.state.write().initialized = true;
        self.init_tx.send_replace(true);
    }

    fn adopt(&self, token: String, user: Option<UserProfile>) {
        let mut st = self.state.write();
        if st.token.as_deref() != Some(token.as_str()) || st.user != user {
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        st.token = Some(token);
        st.user = user;
    }

    fn clear(&self) {
        {
            let mut st = self.state.write();
            if st.token.is_some() || st.user.is_some() {
                self.generation.fetch_add(1, Ordering::SeqCst);
            }
            st.token = None;
            st.user = None;
        }
        for key in [AUTH_TOKEN_KEY, AUTH_USER_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(target: "session", key, error = %e, "failed to clear persisted session entry");
            }
        }
    }

    fn persist(&self, token: &str, user: &UserProfile) -> GateResult<()> {
        let text = serde_json::to_string(user)?;
        self.storage.set(AUTH_TOKEN_KEY, token)?;
        self.storage.set(AUTH_USER_KEY, &text)?;
        Ok(())
    }

    async fn restore(&self) -> GateResult<bool> {
        let Some(token) = self.storage.get(AUTH_TOKEN_KEY)?.filter(|t| !t.trim().is_empty()) else {
            debug!(target: "session", "no persisted token");
            self.clear();
            return Ok(false);
        };
        let user = match self.storage.get(AUTH_USER_KEY)? {
            Some(text) if !text.trim().is_empty() => Some(serde_json::from_str::<UserProfile>(&text)?),
            _ => None,
        };
        if self.opts.validate_token_on_restore {
            self.provider.validate_token(&token).await?;
        }
        if let Some(u) = &user {
            // rewrite in canonical shape so later readers never see the legacy role forms
            self.persist(&token, u)?;
        }
        self.adopt(token, user);
        Ok(true)
    }

    /// Re-derive the session from persisted storage. Fails closed: any error means anonymous.
    pub async fn check_auth(&self) -> bool {
        let authenticated = match self.restore().await {
            Ok(v) => v,
            Err(e) => {
                match &e {
                    GateError::SessionExpired { .. } => info!(target: "session", "stored token rejected, clearing session"),
                    _ => warn!(target: "session", code = e.code_str(), error = %e, "session restore failed, clearing session"),
                }
                self.clear();
                false
            }
        };
        self.mark_initialized();
        let snap = self.snapshot();
        info!(target: "session", authenticated, role = ?snap.role_name(), "session initialized");
        authenticated
    }

    pub async fn login(&self, req: &LoginRequest) -> GateResult<UserProfile> {
        let result = self.try_login(req).await;
        if let Err(e) = &result {
            warn!(target: "session", username = %req.username, error = %e, "login failed");
            self.clear();
        }
        self.mark_initialized();
        let user = result?;
        if self.opts.audit {
            if let Err(e) = self.audit.record(&ActivityEvent::login(&user.username)).await {
                warn!(target: "session", error = %e, "failed to record login activity");
            }
        }
        info!(target: "session", username = %user.username, role = ?user.role_name(), "login succeeded");
        Ok(user)
    }

    async fn try_login(&self, req: &LoginRequest) -> GateResult<UserProfile> {
        let reply = self.provider.login(req).await.map_err(|e| match e {
            GateError::Authentication { .. } => e,
            GateError::Transport { message } | GateError::Timeout { message } => GateError::authentication(None, message),
            other => GateError::authentication(None, other.to_string()),
        })?;
        let (token, user) = reply.into_parts();
        if token.trim().is_empty() {
            return Err(GateError::authentication(None, "login response carried no token"));
        }
        self.persist(&token, &user)
            .map_err(|e| GateError::authentication(None, format!("could not persist session: {}", e)))?;
        self.adopt(token, Some(user.clone()));
        Ok(user)
    }

    pub async fn logout(&self) {
        let snap = self.snapshot();
        if self.opts.audit && snap.is_authenticated() {
            if let Err(e) = self.audit.record(&ActivityEvent::logout(snap.username())).await {
                warn!(target: "session", error = %e, "failed to record logout activity");
            }
        }
        self.clear();
        info!(target: "session", username = ?snap.username(), "logged out");
    }
}
