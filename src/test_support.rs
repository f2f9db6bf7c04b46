//! In-process stand-ins for the records backend, shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use crate::error::{GateError, GateResult};
use crate::identity::audit::{ActivityEvent, AuditSink};
use crate::identity::permissions;
use crate::identity::principal::{EntityId, LoginReply};
use crate::identity::provider::{AuthProvider, LoginRequest, PermissionRecord, RoleDetail, RoleDirectory, RoleSummary};

/// Users log in with password == username:
/// `demo` (SUPERADMIN, name only), `reader` (role 2, DOCUMENT_READ), `admin` (role 1, ADMINISTRADOR), `norole`.
#[derive(Default)]
pub struct FakeBackend {
    reject_tokens: AtomicBool,
    fail_roles: AtomicBool,
    delay: Mutex<Duration>,
    role_lookups: AtomicUsize,
    role_fetches: AtomicUsize,
}

impl FakeBackend {
    pub fn reject_tokens(&self) { self.reject_tokens.store(true, Ordering::SeqCst); }
    pub fn fail_roles(&self, fail: bool) { self.fail_roles.store(fail, Ordering::SeqCst); }
    pub fn set_delay(&self, d: Duration) { *self.delay.lock() = d; }
    pub fn role_lookups(&self) -> usize { self.role_lookups.load(Ordering::SeqCst) }
    pub fn role_fetches(&self) -> usize { self.role_fetches.load(Ordering::SeqCst) }

    fn reply_for(username: &str) -> Option<serde_json::Value> {
        let v = match username {
            "demo" => json!({"token": "tok-demo", "user": {"id": "demo_user", "username": "demo", "role": {"name": "SUPERADMIN"}}}),
            "reader" => json!({"token": "tok-reader", "id": 2, "username": "reader", "role": {"id": 2, "name": "READER"}}),
            "admin" => json!({"token": "tok-admin", "id": 1, "username": "admin", "role": {"id": 1, "roleName": "ADMINISTRADOR"}}),
            "norole" => json!({"token": "tok-norole", "id": 3, "username": "norole"}),
            _ => return None,
        };
        Some(v)
    }
}

#[async_trait]
impl AuthProvider for FakeBackend {
    async fn login(&self, req: &LoginRequest) -> GateResult<LoginReply> {
        match Self::reply_for(&req.username) {
            Some(v) if req.password == req.username => Ok(serde_json::from_value(v)?),
            _ => Err(GateError::authentication(Some(401), "Credenciales inválidas")),
        }
    }

    async fn validate_token(&self, _token: &str) -> GateResult<()> {
        if self.reject_tokens.load(Ordering::SeqCst) {
            return Err(GateError::session_expired("token rejected"));
        }
        Ok(())
    }
}

#[async_trait]
impl RoleDirectory for FakeBackend {
    async fn find_roles_by_name(&self, name: &str) -> GateResult<Vec<RoleSummary>> {
        self.role_lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_roles.load(Ordering::SeqCst) {
            return Err(GateError::transport("roles endpoint unavailable"));
        }
        let all = [RoleSummary { id: EntityId::from("role_superadmin"), name: "SUPERADMIN".into() }];
        Ok(all.into_iter().filter(|r| r.name.eq_ignore_ascii_case(name)).collect())
    }

    async fn fetch_role(&self, id: &EntityId) -> GateResult<RoleDetail> {
        self.role_fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_roles.load(Ordering::SeqCst) {
            return Err(GateError::transport("roles endpoint unavailable"));
        }
        let (name, perms): (&str, Vec<&str>) = match id.to_string().as_str() {
            "1" => ("ADMINISTRADOR", permissions::ALL.to_vec()),
            "2" => ("READER", vec![permissions::DOCUMENT_READ]),
            "role_superadmin" => ("SUPERADMIN", permissions::ALL.to_vec()),
            other => return Err(GateError::transport(format!("role {} not found", other))),
        };
        Ok(RoleDetail {
            id: id.clone(),
            name: name.into(),
            permissions: perms.into_iter().map(|p| PermissionRecord { id: None, name: p.to_string() }).collect(),
        })
    }
}

#[derive(Default)]
pub struct RecordingAudit {
    events: Mutex<Vec<ActivityEvent>>,
}

impl RecordingAudit {
    pub fn events(&self) -> Vec<ActivityEvent> { self.events.lock().clone() }
}

#[async_trait]
impl AuditSink for RecordingAudit {
    async fn record(&self, event: &ActivityEvent) -> GateResult<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
