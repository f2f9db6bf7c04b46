#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use console_gate::config::GateConfig;
use console_gate::identity::{MemoryStorage, SessionStorage};
use console_gate::routing::console::console_routes;
use console_gate::AuthContext;

pub const ALL_PERMISSIONS: &[&str] = console_gate::identity::permissions::ALL;

#[derive(Default)]
pub struct MockState {
    pub activity: Mutex<Vec<Value>>,
    pub role_fetches: AtomicUsize,
    pub fail_roles: AtomicBool,
    pub bearer_seen: Mutex<Vec<String>>,
}

/// In-process records backend on an ephemeral port. Aborted on drop.
pub struct MockBackend {
    pub base_url: String,
    pub state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl Drop for MockBackend {
    fn drop(&mut self) { self.handle.abort(); }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

async fn login(Json(body): Json<Value>) -> Response {
    let user = body["username"].as_str().unwrap_or_default();
    let pass = body["password"].as_str().unwrap_or_default();
    if user.is_empty() || user != pass {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Credenciales inválidas"}))).into_response();
    }
    let token = format!("mock-token-{}", user);
    let reply = match user {
        "demo" => json!({"token": token, "user": {"id": "demo_user", "username": "demo", "email": "demo@example.com", "role": {"name": "SUPERADMIN"}}}),
        "admin" => json!({"token": token, "id": 1, "username": "admin", "fullName": "Admin", "role": {"id": 1, "roleName": "ADMINISTRADOR"}}),
        "reader" => json!({"token": token, "id": 2, "username": "reader", "role": {"id": 2, "name": "READER"}}),
        _ => return (StatusCode::UNAUTHORIZED, "unknown user").into_response(),
    };
    Json(reply).into_response()
}

async fn validate_token(headers: HeaderMap) -> Response {
    match bearer(&headers) {
        Some(t) if t.starts_with("mock-token-") => Json(json!({"valid": true})).into_response(),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({"error": "token expired"}))).into_response(),
    }
}

async fn find_roles(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    let name = q.get("name").cloned().unwrap_or_default();
    if name.eq_ignore_ascii_case("SUPERADMIN") {
        Json(json!([{"id": "role_superadmin", "name": "SUPERADMIN"}]))
    } else {
        Json(json!([]))
    }
}

async fn fetch_role(State(st): State<Arc<MockState>>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    st.role_fetches.fetch_add(1, Ordering::SeqCst);
    let Some(token) = bearer(&headers) else {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "missing token"}))).into_response();
    };
    st.bearer_seen.lock().push(token);
    if st.fail_roles.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "role store offline").into_response();
    }
    let (name, perms): (&str, Vec<&str>) = match id.as_str() {
        "1" => ("ADMINISTRADOR", ALL_PERMISSIONS.to_vec()),
        "2" => ("READER", vec!["DOCUMENT_READ"]),
        "role_superadmin" => ("SUPERADMIN", ALL_PERMISSIONS.to_vec()),
        _ => return (StatusCode::NOT_FOUND, Json(json!({"message": "role not found"}))).into_response(),
    };
    let permissions: Vec<Value> = perms.iter().enumerate().map(|(i, p)| json!({"id": i + 1, "name": p})).collect();
    Json(json!({"id": id, "name": name, "permissions": permissions})).into_response()
}

async fn activity(State(st): State<Arc<MockState>>, Json(body): Json<Value>) -> StatusCode {
    st.activity.lock().push(body);
    StatusCode::CREATED
}

pub async fn start_mock_backend() -> MockBackend {
    let state = Arc::new(MockState::default());
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/validate-token", get(validate_token))
        .route("/api/roles", get(find_roles))
        .route("/api/roles/{id}", get(fetch_role))
        .route("/api/activity-logs", post(activity))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.expect("bind 127.0.0.1:0");
    let addr = listener.local_addr().expect("local addr");
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("mock backend error: {e:?}");
        }
    });
    MockBackend { base_url: format!("http://{}/api", addr), state, handle }
}

pub fn config_for(mock: &MockBackend) -> GateConfig {
    GateConfig { api_base_url: mock.base_url.clone(), ..GateConfig::default() }
}

pub fn context_with(mock: &MockBackend, storage: Arc<dyn SessionStorage>) -> AuthContext {
    AuthContext::with_rest(config_for(mock), storage, console_routes()).expect("context")
}

pub fn memory_context(mock: &MockBackend) -> AuthContext { context_with(mock, Arc::new(MemoryStorage::new())) }
