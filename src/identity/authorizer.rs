//! Authorization evaluator: pure checks over an owned session + catalog snapshot.
//! Nothing here performs I/O; callers load the catalog first.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::catalog::PermissionCatalog;
use super::permissions::normalize_permission;
use super::session::SessionState;

/// Uppercase, trim and strip one leading `ROLE_`.
pub fn normalize_role_name(raw: &str) -> String {
    let up = raw.trim().to_uppercase();
    match up.strip_prefix("ROLE_") {
        Some(rest) => rest.to_string(),
        None => up,
    }
}

// ADMIN and ADMINISTRADOR name the same role
fn canonical_alias(normalized: &str) -> &str {
    if normalized == "ADMINISTRADOR" { "ADMIN" } else { normalized }
}

/// Symmetric role equality under normalization and the admin alias. Empty names never match.
pub fn role_matches(a: &str, b: &str) -> bool {
    let (a, b) = (normalize_role_name(a), normalize_role_name(b));
    if a.is_empty() || b.is_empty() {
        return false;
    }
    canonical_alias(&a) == canonical_alias(&b)
}

/// A named capability check, as UI code declares them in bulk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionRequirement {
    One(String),
    All(Vec<String>),
    Any(Vec<String>),
    Role(String),
    AnyRole(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct Authorizer {
    catalog: Arc<PermissionCatalog>,
    session: SessionState,
    empty_any_allows: bool,
}

impl Authorizer {
    pub fn new(catalog: Arc<PermissionCatalog>, session: SessionState) -> Self {
        Self { catalog, session, empty_any_allows: false }
    }

    /// Verdict for `has_any_permission(&[])`; false unless configured otherwise.
    pub fn with_empty_any_allows(mut self, allows: bool) -> Self {
        self.empty_any_allows = allows;
        self
    }

    pub fn catalog(&self) -> &PermissionCatalog { &self.catalog }
    pub fn session(&self) -> &SessionState { &self.session }

    pub fn has_permission(&self, name: &str) -> bool {
        if !self.catalog.initialized {
            return false;
        }
        self.catalog.permissions.contains(&normalize_permission(name))
    }

    pub fn has_all_permissions<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.iter().all(|n| self.has_permission(n.as_ref()))
    }

    pub fn has_any_permission<S: AsRef<str>>(&self, names: &[S]) -> bool {
        if names.is_empty() {
            return self.empty_any_allows;
        }
        names.iter().any(|n| self.has_permission(n.as_ref()))
    }

    /// The user's role name; the session profile wins over the catalog's copy.
    /// Anonymous sessions have no role, whatever the catalog says.
    pub fn role_name(&self) -> Option<&str> {
        if !self.session.is_authenticated() {
            return None;
        }
        self.session.role_name().or(self.catalog.role_name.as_deref().filter(|n| !n.is_empty()))
    }

    pub fn has_role(&self, name: &str) -> bool {
        match self.role_name() {
            Some(mine) => role_matches(mine, name),
            None => false,
        }
    }

    pub fn has_any_role<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.iter().any(|n| self.has_role(n.as_ref()))
    }

    pub fn is_admin(&self) -> bool { self.has_role("ADMIN") }

    pub fn evaluate(&self, req: &PermissionRequirement) -> bool {
        match req {
            PermissionRequirement::One(p) => self.has_permission(p),
            PermissionRequirement::All(ps) => self.has_all_permissions(ps.as_slice()),
            PermissionRequirement::Any(ps) => self.has_any_permission(ps.as_slice()),
            PermissionRequirement::Role(r) => self.has_role(r),
            PermissionRequirement::AnyRole(rs) => self.has_any_role(rs.as_slice()),
        }
    }

    /// Evaluate a map of named requirements, e.g. `can_create_document -> One(DOCUMENT_CREATE)`.
    pub fn evaluate_map(&self, reqs: &BTreeMap<String, PermissionRequirement>) -> BTreeMap<String, bool> {
        reqs.iter().map(|(k, r)| (k.clone(), self.evaluate(r))).collect()
    }
}
