//! Navigation guard: decides Allow or Redirect for one transition.
//!
//! Order per transition: wait for session init, flatten requirements, auth check,
//! login-page bounce, catalog load, permission check (any-of), role check (any-of).
//! Errors never escape; they become a redirect to Login (anonymous) or Unauthorized.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{Location, RouteMatch};
use crate::config::RouteNames;
use crate::error::{GateError, GateResult};
use crate::identity::{Authorizer, CatalogLoader, SessionStore};

pub const REDIRECT_QUERY: &str = "redirect";
pub const ERROR_QUERY: &str = "error";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    Allow,
    Redirect(Location),
}

impl NavigationDecision {
    pub fn is_allow(&self) -> bool { matches!(self, NavigationDecision::Allow) }
}

#[derive(Clone)]
pub struct NavigationGuard {
    session: Arc<SessionStore>,
    catalog: Arc<CatalogLoader>,
    routes: RouteNames,
    init_timeout: Option<Duration>,
    empty_any_allows: bool,
}

impl NavigationGuard {
    pub fn new(session: Arc<SessionStore>, catalog: Arc<CatalogLoader>, routes: RouteNames) -> Self {
        Self { session, catalog, routes, init_timeout: None, empty_any_allows: false }
    }

    pub fn with_init_timeout(mut self, limit: Option<Duration>) -> Self {
        self.init_timeout = limit;
        self
    }

    pub fn with_empty_any_allows(mut self, allows: bool) -> Self {
        self.empty_any_allows = allows;
        self
    }

    pub fn routes(&self) -> &RouteNames { &self.routes }

    pub async fn check(&self, to: &RouteMatch) -> NavigationDecision {
        match self.decide(to).await {
            Ok(d) => {
                debug!(target: "guard", to = %to.full_path, decision = ?d, "guard verdict");
                d
            }
            Err(e) => {
                warn!(target: "guard", to = %to.full_path, code = e.code_str(), error = %e, "guard failed; redirecting");
                if self.session.is_authenticated() {
                    self.unauthorized(Some(e.code_str()))
                } else {
                    self.login_with_return(to)
                }
            }
        }
    }

    async fn decide(&self, to: &RouteMatch) -> GateResult<NavigationDecision> {
        self.wait_for_session().await?;

        let req = to.requirement();
        let authenticated = self.session.is_authenticated();

        if req.requires_auth && !authenticated {
            info!(target: "guard", to = %to.full_path, "authentication required");
            return Ok(self.login_with_return(to));
        }
        if authenticated && to.is_named(&self.routes.login) {
            return Ok(NavigationDecision::Redirect(Location::named(self.routes.landing.clone())));
        }
        if !req.requires_auth {
            return Ok(NavigationDecision::Allow);
        }

        let catalog = match self.catalog.ensure_loaded().await {
            Ok(c) => c,
            Err(e) => {
                warn!(target: "guard", to = %to.full_path, error = %e, "permission catalog unavailable");
                return Ok(self.unauthorized(Some(e.code_str())));
            }
        };
        let authz = Authorizer::new(catalog, self.session.snapshot()).with_empty_any_allows(self.empty_any_allows);

        if !req.required_permissions.is_empty() && !authz.has_any_permission(req.required_permissions.as_slice()) {
            info!(target: "guard", to = %to.full_path, required = ?req.required_permissions, "missing permission");
            return Ok(self.unauthorized(None));
        }
        if !req.required_roles.is_empty() && !authz.has_any_role(req.required_roles.as_slice()) {
            info!(target: "guard", to = %to.full_path, required = ?req.required_roles, role = ?authz.role_name(), "role mismatch");
            return Ok(self.unauthorized(None));
        }
        Ok(NavigationDecision::Allow)
    }

    async fn wait_for_session(&self) -> GateResult<()> {
        match self.init_timeout {
            Some(limit) => tokio::time::timeout(limit, self.session.wait_initialized())
                .await
                .map_err(|_| GateError::timeout(format!("session not initialized within {} ms", limit.as_millis()))),
            None => {
                self.session.wait_initialized().await;
                Ok(())
            }
        }
    }

    fn login_with_return(&self, to: &RouteMatch) -> NavigationDecision {
        NavigationDecision::Redirect(Location::named(self.routes.login.clone()).with_query(REDIRECT_QUERY, to.full_path.clone()))
    }

    fn unauthorized(&self, error: Option<&str>) -> NavigationDecision {
        let loc = Location::named(self.routes.unauthorized.clone());
        NavigationDecision::Redirect(match error {
            Some(code) => loc.with_query(ERROR_QUERY, code),
            None => loc,
        })
    }
}
