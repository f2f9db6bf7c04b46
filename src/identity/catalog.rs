//! Permission catalog of the current session's role.
//!
//! The catalog is an immutable snapshot behind an `Arc`; loads build a fresh value and
//! swap it in whole. At most one load runs per session epoch: concurrent callers await
//! the same shared future. `reset` bumps the epoch so a load that started for a previous
//! session can never publish its result. The catalog also remembers the session generation
//! it belongs to; once the session's identity changes, the cached catalog is dropped before
//! anyone can read it.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::authorizer::role_matches;
use super::permissions::normalize_permission;
use super::principal::EntityId;
use super::provider::RoleDirectory;
use super::session::SessionStore;
use crate::error::{GateError, GateResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionCatalog {
    pub role_id: Option<EntityId>,
    pub role_name: Option<String>,
    /// Uppercased permission names.
    pub permissions: BTreeSet<String>,
    pub initialized: bool,
}

impl PermissionCatalog {
    /// Initialized catalog granting nothing.
    pub fn empty_initialized() -> Self { PermissionCatalog { initialized: true, ..Default::default() } }

    pub fn with_permissions<I, S>(role_name: Option<&str>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        PermissionCatalog {
            role_id: None,
            role_name: role_name.map(str::to_string),
            permissions: names.into_iter().map(|n| normalize_permission(n.as_ref())).filter(|n| !n.is_empty()).collect(),
            initialized: true,
        }
    }

    pub fn contains(&self, name: &str) -> bool { self.permissions.contains(&normalize_permission(name)) }
    pub fn len(&self) -> usize { self.permissions.len() }
    pub fn is_empty(&self) -> bool { self.permissions.is_empty() }
}

type LoadFuture = Shared<BoxFuture<'static, GateResult<Arc<PermissionCatalog>>>>;

struct InFlight {
    id: u64,
    epoch: u64,
    fut: LoadFuture,
}

struct CatalogInner {
    catalog: Arc<PermissionCatalog>,
    epoch: u64,
    session_generation: u64,
    last_error: Option<GateError>,
}

pub struct CatalogLoader {
    session: Arc<SessionStore>,
    directory: Arc<dyn RoleDirectory>,
    timeout: Option<Duration>,
    inner: RwLock<CatalogInner>,
    inflight: Mutex<Option<InFlight>>,
    next_load_id: AtomicU64,
}

impl CatalogLoader {
    pub fn new(session: Arc<SessionStore>, directory: Arc<dyn RoleDirectory>, timeout: Option<Duration>) -> Self {
        let session_generation = session.generation();
        Self {
            session,
            directory,
            timeout,
            inner: RwLock::new(CatalogInner {
                catalog: Arc::new(PermissionCatalog::default()),
                epoch: 0,
                session_generation,
                last_error: None,
            }),
            inflight: Mutex::new(None),
            next_load_id: AtomicU64::new(1),
        }
    }

    pub fn snapshot(&self) -> Arc<PermissionCatalog> {
        self.follow_session();
        self.inner.read().catalog.clone()
    }

    pub fn is_initialized(&self) -> bool { self.snapshot().initialized }
    pub fn is_loading(&self) -> bool { self.inflight.lock().is_some() }

    pub fn last_error(&self) -> Option<GateError> {
        self.follow_session();
        self.inner.read().last_error.clone()
    }

    /// Drop the cached catalog (logout, or before a new login).
    pub fn reset(&self) { self.reset_for(self.session.generation(), true); }

    fn reset_for(&self, generation: u64, force: bool) {
        let mut slot = self.inflight.lock();
        let mut inner = self.inner.write();
        if !force && inner.session_generation == generation {
            return;
        }
        inner.epoch += 1;
        inner.session_generation = generation;
        inner.catalog = Arc::new(PermissionCatalog::default());
        inner.last_error = None;
        *slot = None;
        debug!(target: "catalog", epoch = inner.epoch, generation, "permission catalog reset");
    }

    /// Reset when the session identity moved on since the catalog was built.
    fn follow_session(&self) {
        let generation = self.session.generation();
        if self.inner.read().session_generation != generation {
            info!(target: "catalog", generation, "session changed; dropping cached permissions");
            self.reset_for(generation, false);
        }
    }

    /// Load the catalog unless it is already initialized.
    pub async fn ensure_loaded(self: &Arc<Self>) -> GateResult<Arc<PermissionCatalog>> {
        let current = self.snapshot();
        if current.initialized {
            return Ok(current);
        }
        self.load_user_permissions().await
    }

    /// Fetch the permissions of the session's role. Joins a load already in flight.
    ///
    /// The fetch runs as its own task; awaiters only hold its join handle, so dropping
    /// every awaiter neither cancels the load nor leaves it parked in `inflight`.
    pub async fn load_user_permissions(self: &Arc<Self>) -> GateResult<Arc<PermissionCatalog>> {
        self.follow_session();
        let fut = {
            let mut slot = self.inflight.lock();
            let epoch = self.inner.read().epoch;
            match slot.as_ref() {
                Some(f) if f.epoch == epoch => f.fut.clone(),
                _ => {
                    let id = self.next_load_id.fetch_add(1, Ordering::Relaxed);
                    let me = Arc::clone(self);
                    let task = tokio::spawn(async move {
                        let out = me.fetch_and_publish(epoch).await;
                        me.finish(id);
                        out
                    });
                    let fut = async move {
                        match task.await {
                            Ok(out) => out,
                            Err(e) => Err(GateError::permission_load(format!("permission load aborted: {}", e))),
                        }
                    }
                    .boxed()
                    .shared();
                    *slot = Some(InFlight { id, epoch, fut: fut.clone() });
                    fut
                }
            }
        };
        fut.await
    }

    fn finish(&self, id: u64) {
        let mut slot = self.inflight.lock();
        if slot.as_ref().map(|f| f.id == id).unwrap_or(false) {
            *slot = None;
        }
    }

    async fn fetch_and_publish(&self, epoch: u64) -> GateResult<Arc<PermissionCatalog>> {
        let generation = self.session.generation();
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.fetch()).await {
                Ok(r) => r,
                Err(_) => Err(GateError::timeout(format!("permission load exceeded {} ms", limit.as_millis()))),
            },
            None => self.fetch().await,
        };
        let mut inner = self.inner.write();
        if inner.epoch != epoch || inner.session_generation != generation || self.session.generation() != generation {
            return Err(GateError::permission_load("session changed while permissions were loading"));
        }
        match result {
            Ok(cat) => {
                let cat = Arc::new(cat);
                inner.catalog = cat.clone();
                inner.last_error = None;
                Ok(cat)
            }
            Err(e) => {
                let e = e.into_permission_load();
                warn!(target: "catalog", error = %e, "permission load failed; catalog left uninitialized");
                inner.catalog = Arc::new(PermissionCatalog::default());
                inner.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    async fn fetch(&self) -> GateResult<PermissionCatalog> {
        let snap = self.session.snapshot();
        if !snap.is_authenticated() {
            debug!(target: "catalog", "anonymous session; empty catalog");
            return Ok(PermissionCatalog::empty_initialized());
        }
        let Some(role) = snap.user.as_ref().and_then(|u| u.role.clone()) else {
            info!(target: "catalog", "user has no role; empty catalog");
            return Ok(PermissionCatalog::empty_initialized());
        };

        let role_id = match role.id.clone() {
            Some(id) => id,
            None => {
                let candidates = self.directory.find_roles_by_name(&role.name).await?;
                match candidates.into_iter().find(|r| role_matches(&r.name, &role.name)) {
                    Some(found) => found.id,
                    None => {
                        warn!(target: "catalog", role = %role.name, "role lookup returned no match; empty catalog");
                        return Ok(PermissionCatalog { role_name: Some(role.name), ..PermissionCatalog::empty_initialized() });
                    }
                }
            }
        };

        let detail = self.directory.fetch_role(&role_id).await?;
        let permissions: BTreeSet<String> = detail
            .permissions
            .iter()
            .map(|p| normalize_permission(&p.name))
            .filter(|p| !p.is_empty())
            .collect();
        let role_name = if role.name.is_empty() { detail.name } else { role.name };
        info!(target: "catalog", role = %role_name, role_id = %role_id, count = permissions.len(), "permissions loaded");
        Ok(PermissionCatalog { role_id: Some(role_id), role_name: Some(role_name), permissions, initialized: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::provider::LoginRequest;
    use crate::identity::session::SessionOptions;
    use crate::identity::storage::{MemoryStorage, SessionStorage};
    use crate::test_support::{FakeBackend, RecordingAudit};

    async fn logged_in(backend: &Arc<FakeBackend>, user: &str) -> Arc<SessionStore> {
        let s = Arc::new(SessionStore::new(
            Arc::new(MemoryStorage::new()),
            backend.clone(),
            Arc::new(RecordingAudit::default()),
            SessionOptions::default(),
        ));
        s.login(&LoginRequest::new(user, user)).await.unwrap();
        s
    }

    fn loader(session: Arc<SessionStore>, backend: &Arc<FakeBackend>) -> Arc<CatalogLoader> {
        Arc::new(CatalogLoader::new(session, backend.clone(), None))
    }

    #[tokio::test]
    async fn loads_permissions_for_role_id() {
        let backend = Arc::new(FakeBackend::default());
        let l = loader(logged_in(&backend, "reader").await, &backend);
        let cat = l.load_user_permissions().await.unwrap();
        assert!(cat.initialized);
        assert!(cat.contains("document_read"));
        assert!(!cat.contains("DOCUMENT_CREATE"));
        assert_eq!(backend.role_lookups(), 0);
    }

    #[tokio::test]
    async fn resolves_role_id_by_name_first() {
        let backend = Arc::new(FakeBackend::default());
        let l = loader(logged_in(&backend, "demo").await, &backend);
        let cat = l.load_user_permissions().await.unwrap();
        assert_eq!(backend.role_lookups(), 1);
        assert_eq!(cat.role_id, Some(EntityId::from("role_superadmin")));
        assert!(cat.contains("DOCUMENT_CREATE"));
    }

    #[tokio::test]
    async fn no_role_gives_empty_initialized_catalog() {
        let backend = Arc::new(FakeBackend::default());
        let l = loader(logged_in(&backend, "norole").await, &backend);
        let cat = l.load_user_permissions().await.unwrap();
        assert!(cat.initialized);
        assert!(cat.is_empty());
        assert_eq!(backend.role_fetches(), 0);
    }

    #[tokio::test]
    async fn failure_leaves_catalog_uninitialized() {
        let backend = Arc::new(FakeBackend::default());
        let l = loader(logged_in(&backend, "reader").await, &backend);
        backend.fail_roles(true);
        let err = l.load_user_permissions().await.unwrap_err();
        assert_eq!(err.code_str(), "permission_load_failed");
        assert!(!l.is_initialized());
        assert!(!l.snapshot().contains("DOCUMENT_READ"));
        assert!(l.last_error().is_some());

        backend.fail_roles(false);
        assert!(l.ensure_loaded().await.unwrap().contains("DOCUMENT_READ"));
        assert!(l.last_error().is_none());
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_fetch() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_delay(Duration::from_millis(50));
        let l = loader(logged_in(&backend, "reader").await, &backend);
        let (a, b, c) = tokio::join!(l.load_user_permissions(), l.load_user_permissions(), l.ensure_loaded());
        assert_eq!(a.unwrap(), b.unwrap());
        assert!(c.unwrap().initialized);
        assert_eq!(backend.role_fetches(), 1);
        assert!(!l.is_loading());
    }

    #[tokio::test]
    async fn reset_discards_load_in_flight() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_delay(Duration::from_millis(50));
        let l = loader(logged_in(&backend, "reader").await, &backend);
        let pending = {
            let l = l.clone();
            tokio::spawn(async move { l.load_user_permissions().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        l.reset();
        assert!(pending.await.unwrap().is_err());
        assert!(!l.is_initialized());
    }

    #[tokio::test]
    async fn dropped_session_invalidates_cached_catalog() {
        let backend = Arc::new(FakeBackend::default());
        let storage = Arc::new(MemoryStorage::new());
        let session = Arc::new(SessionStore::new(
            storage.clone(),
            backend.clone(),
            Arc::new(RecordingAudit::default()),
            SessionOptions::default(),
        ));
        session.login(&LoginRequest::new("admin", "admin")).await.unwrap();
        let l = loader(session.clone(), &backend);
        assert!(l.ensure_loaded().await.unwrap().contains("USER_DELETE"));

        storage.remove(crate::identity::AUTH_TOKEN_KEY).unwrap();
        assert!(!session.check_auth().await);
        assert!(!l.is_initialized());
        assert!(!l.snapshot().contains("USER_DELETE"));
        let cat = l.ensure_loaded().await.unwrap();
        assert!(cat.initialized);
        assert!(cat.is_empty());
    }

    #[tokio::test]
    async fn abandoned_load_still_completes() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_delay(Duration::from_millis(30));
        let l = loader(logged_in(&backend, "reader").await, &backend);
        let abandoned = tokio::time::timeout(Duration::from_millis(5), l.load_user_permissions()).await;
        assert!(abandoned.is_err());
        assert!(l.is_loading());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!l.is_loading());
        assert!(l.snapshot().contains("DOCUMENT_READ"));
        assert_eq!(backend.role_fetches(), 1);
        assert_eq!(Arc::strong_count(&l), 1);
    }

    #[tokio::test]
    async fn timeout_fails_closed() {
        let backend = Arc::new(FakeBackend::default());
        backend.set_delay(Duration::from_millis(200));
        let session = logged_in(&backend, "reader").await;
        let l = Arc::new(CatalogLoader::new(session, backend.clone(), Some(Duration::from_millis(20))));
        let err = l.load_user_permissions().await.unwrap_err();
        assert_eq!(err.code_str(), "permission_load_failed");
        assert!(!l.is_initialized());
    }
}
