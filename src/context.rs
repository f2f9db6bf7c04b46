//! Application-root object owning the session, the permission catalog and the navigator.
//! One context per console instance; nothing here is global.

use std::sync::Arc;

use tracing::info;

use crate::api::RestClient;
use crate::config::GateConfig;
use crate::error::GateResult;
use crate::identity::{
    AuditSink, AuthProvider, Authorizer, CatalogLoader, LoginRequest, NoopAudit, RoleDirectory, SessionOptions, SessionStorage,
    SessionStore, UserProfile,
};
use crate::routing::guard::REDIRECT_QUERY;
use crate::routing::{Location, NavigationGuard, NavigationOutcome, Navigator, RouteRecord, RouteTable};
use crate::visibility::{VisibilityBinding, VisibilityDirective};

/// Backend collaborators, usually one client implementing all three.
pub struct Backend {
    pub auth: Arc<dyn AuthProvider>,
    pub roles: Arc<dyn RoleDirectory>,
    pub audit: Arc<dyn AuditSink>,
}

impl Backend {
    pub fn from_client<C>(client: Arc<C>) -> Self
    where
        C: AuthProvider + RoleDirectory + AuditSink + 'static,
    {
        Backend { auth: client.clone(), roles: client.clone(), audit: client }
    }
}

pub struct AuthContext {
    config: GateConfig,
    session: Arc<SessionStore>,
    catalog: Arc<CatalogLoader>,
    navigator: Arc<Navigator>,
}

impl AuthContext {
    pub fn new(config: GateConfig, storage: Arc<dyn SessionStorage>, backend: Backend, routes: Vec<RouteRecord>) -> GateResult<Self> {
        config.validate()?;
        let audit: Arc<dyn AuditSink> = if config.audit { backend.audit } else { Arc::new(NoopAudit) };
        let session = Arc::new(SessionStore::new(
            storage,
            backend.auth,
            audit,
            SessionOptions { validate_token_on_restore: config.validate_token_on_restore, audit: config.audit },
        ));
        let catalog = Arc::new(CatalogLoader::new(session.clone(), backend.roles, config.permission_timeout));
        let guard = NavigationGuard::new(session.clone(), catalog.clone(), config.routes.clone())
            .with_init_timeout(config.init_timeout)
            .with_empty_any_allows(config.empty_any_allows);
        let table = Arc::new(RouteTable::new(routes)?);
        let navigator = Arc::new(Navigator::new(table, guard, config.max_redirects));
        Ok(Self { config, session, catalog, navigator })
    }

    /// Context talking to the REST backend named in `config`.
    pub fn with_rest(config: GateConfig, storage: Arc<dyn SessionStorage>, routes: Vec<RouteRecord>) -> GateResult<Self> {
        let client = Arc::new(RestClient::new(&config.api_base_url, storage.clone())?);
        Self::new(config, storage, Backend::from_client(client), routes)
    }

    pub fn config(&self) -> &GateConfig { &self.config }
    pub fn session(&self) -> &Arc<SessionStore> { &self.session }
    pub fn catalog(&self) -> &Arc<CatalogLoader> { &self.catalog }
    pub fn navigator(&self) -> &Arc<Navigator> { &self.navigator }

    /// Restore the persisted session. Releases every guard waiting on initialization.
    pub async fn bootstrap(&self) -> bool { self.session.check_auth().await }

    /// Log in, then go to the pending `redirect` target or the landing route.
    pub async fn login(&self, req: &LoginRequest) -> GateResult<(UserProfile, NavigationOutcome)> {
        self.catalog.reset();
        let user = self.session.login(req).await?;
        let outcome = self.navigator.push(self.post_login_target()).await;
        Ok((user, outcome))
    }

    fn post_login_target(&self) -> Location {
        let pending = self.navigator.current().and_then(|m| m.query.get(REDIRECT_QUERY).cloned());
        match pending {
            // only same-origin absolute paths
            Some(path) if path.starts_with('/') && !path.starts_with("//") => Location::path(&path),
            _ => Location::named(self.config.routes.landing.clone()),
        }
    }

    pub async fn logout(&self) -> NavigationOutcome {
        self.session.logout().await;
        self.catalog.reset();
        info!(target: "session", "session cleared; returning to login");
        self.navigator.push(Location::named(self.config.routes.login.clone())).await
    }

    pub async fn navigate<L: Into<Location>>(&self, to: L) -> NavigationOutcome { self.navigator.push(to).await }

    pub async fn back(&self) -> NavigationOutcome { self.navigator.back().await }

    /// Owned evaluator over the current session and catalog snapshots.
    pub fn authorizer(&self) -> Authorizer {
        Authorizer::new(self.catalog.snapshot(), self.session.snapshot()).with_empty_any_allows(self.config.empty_any_allows)
    }

    /// Authorizer with the catalog loaded first (anonymous sessions get an empty catalog).
    pub async fn loaded_authorizer(&self) -> GateResult<Authorizer> {
        let catalog = self.catalog.ensure_loaded().await?;
        Ok(Authorizer::new(catalog, self.session.snapshot()).with_empty_any_allows(self.config.empty_any_allows))
    }

    pub fn visibility(&self, binding: VisibilityBinding) -> VisibilityDirective {
        VisibilityDirective::new(binding, self.session.clone(), self.catalog.clone(), self.config.empty_any_allows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MemoryStorage;
    use crate::routing::console::console_routes;
    use crate::test_support::{FakeBackend, RecordingAudit};

    fn context() -> (Arc<RecordingAudit>, AuthContext) {
        let fake = Arc::new(FakeBackend::default());
        let audit = Arc::new(RecordingAudit::default());
        let backend = Backend { auth: fake.clone(), roles: fake, audit: audit.clone() };
        let ctx = AuthContext::new(GateConfig::default(), Arc::new(MemoryStorage::new()), backend, console_routes()).unwrap();
        (audit, ctx)
    }

    #[tokio::test]
    async fn login_returns_to_pending_target() {
        let (_, ctx) = context();
        ctx.bootstrap().await;
        let out = ctx.navigate("/inventarios/12").await;
        assert!(out.committed().unwrap().is_named("Login"));
        let (_, out) = ctx.login(&LoginRequest::new("reader", "reader")).await.unwrap();
        assert!(out.committed().unwrap().is_named("inventario-view"));
    }

    #[tokio::test]
    async fn login_without_pending_target_lands_on_dashboard() {
        let (audit, ctx) = context();
        ctx.bootstrap().await;
        let (user, out) = ctx.login(&LoginRequest::new("demo", "demo")).await.unwrap();
        assert_eq!(user.role_name(), Some("SUPERADMIN"));
        assert!(out.committed().unwrap().is_named("Dashboard"));
        assert_eq!(audit.events().len(), 1);
    }

    #[tokio::test]
    async fn logout_resets_catalog_and_goes_to_login() {
        let (_, ctx) = context();
        ctx.bootstrap().await;
        ctx.login(&LoginRequest::new("reader", "reader")).await.unwrap();
        assert!(ctx.navigate("/inventarios").await.committed().is_some());
        assert!(ctx.authorizer().has_permission("DOCUMENT_READ"));
        let out = ctx.logout().await;
        assert!(out.committed().unwrap().is_named("Login"));
        assert!(!ctx.catalog().is_initialized());
        assert!(!ctx.authorizer().has_permission("DOCUMENT_READ"));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let fake = Arc::new(FakeBackend::default());
        let backend = Backend { auth: fake.clone(), roles: fake, audit: Arc::new(NoopAudit) };
        let cfg = GateConfig { max_redirects: 0, ..GateConfig::default() };
        let err = AuthContext::new(cfg, Arc::new(MemoryStorage::new()), backend, console_routes()).err().unwrap();
        assert_eq!(err.code_str(), "configuration_error");
    }
}
