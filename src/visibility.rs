//! Declarative visibility of UI elements by permission or role.
//!
//! `evaluate_visibility` is the pure verdict. `VisibilityDirective` wraps it in the
//! mount / update / unmount lifecycle of one rendered element: hidden until a verdict
//! exists, never flashed visible, and hidden on any load failure.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::identity::{Authorizer, CatalogLoader, PermissionCatalog, SessionState, SessionStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BindingValue {
    One(String),
    Many(Vec<String>),
}

impl BindingValue {
    pub fn names(&self) -> Vec<String> {
        match self {
            BindingValue::One(s) => vec![s.clone()],
            BindingValue::Many(v) => v.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    /// Require every listed permission instead of any.
    #[serde(default)]
    pub all: bool,
    /// Values are role names, not permissions.
    #[serde(default)]
    pub role: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityBinding {
    #[serde(default)]
    pub value: Option<BindingValue>,
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl VisibilityBinding {
    pub fn permission<S: Into<String>>(name: S) -> Self {
        Self { value: Some(BindingValue::One(name.into())), modifiers: Modifiers::default() }
    }

    pub fn any_of<I: IntoIterator<Item = S>, S: Into<String>>(names: I) -> Self {
        Self { value: Some(BindingValue::Many(names.into_iter().map(Into::into).collect())), modifiers: Modifiers::default() }
    }

    pub fn all_of<I: IntoIterator<Item = S>, S: Into<String>>(names: I) -> Self {
        Self { modifiers: Modifiers { all: true, role: false }, ..Self::any_of(names) }
    }

    pub fn roles<I: IntoIterator<Item = S>, S: Into<String>>(names: I) -> Self {
        Self { modifiers: Modifiers { all: false, role: true }, ..Self::any_of(names) }
    }
}

pub fn evaluate_visibility(binding: &VisibilityBinding, catalog: &Arc<PermissionCatalog>, session: &SessionState, empty_any_allows: bool) -> bool {
    let Some(value) = &binding.value else {
        warn!(target: "visibility", "binding without a value; element left visible");
        return true;
    };
    if !catalog.initialized {
        return false;
    }
    let names = value.names();
    let authz = Authorizer::new(catalog.clone(), session.clone()).with_empty_any_allows(empty_any_allows);
    if binding.modifiers.role {
        authz.has_any_role(names.as_slice())
    } else if binding.modifiers.all {
        authz.has_all_permissions(names.as_slice())
    } else {
        authz.has_any_permission(names.as_slice())
    }
}

/// Rendered element the directive toggles.
pub trait Element {
    fn is_displayed(&self) -> bool;
    fn set_displayed(&mut self, shown: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Visible,
    Hidden,
}

pub struct VisibilityDirective {
    binding: VisibilityBinding,
    session: Arc<SessionStore>,
    catalog: Arc<CatalogLoader>,
    empty_any_allows: bool,
    phase: Phase,
    // element's display before mount; restored on a visible verdict
    saved_display: Option<bool>,
}

impl VisibilityDirective {
    pub fn new(binding: VisibilityBinding, session: Arc<SessionStore>, catalog: Arc<CatalogLoader>, empty_any_allows: bool) -> Self {
        Self { binding, session, catalog, empty_any_allows, phase: Phase::Pending, saved_display: None }
    }

    pub fn phase(&self) -> Phase { self.phase }
    pub fn binding(&self) -> &VisibilityBinding { &self.binding }
    pub fn has_saved_state(&self) -> bool { self.saved_display.is_some() }

    pub async fn mounted<E: Element>(&mut self, el: &mut E) {
        self.saved_display = Some(el.is_displayed());
        if self.binding.value.is_none() {
            warn!(target: "visibility", "binding without a value; element left untouched");
            self.phase = Phase::Visible;
            return;
        }
        el.set_displayed(false);
        self.phase = Phase::Pending;
        let verdict = self.verdict().await;
        self.apply(el, verdict);
    }

    /// Re-evaluate after a binding change; the element is only touched when the verdict flips.
    pub async fn updated<E: Element>(&mut self, el: &mut E, binding: VisibilityBinding) {
        if binding == self.binding && self.phase != Phase::Pending {
            return;
        }
        self.binding = binding;
        let verdict = self.verdict().await;
        self.apply(el, verdict);
    }

    pub fn unmounted(&mut self) {
        self.saved_display = None;
        self.phase = Phase::Pending;
    }

    async fn verdict(&self) -> bool {
        let catalog = if self.binding.value.is_some() && !self.catalog.is_initialized() {
            match self.catalog.ensure_loaded().await {
                Ok(c) => c,
                Err(e) => {
                    debug!(target: "visibility", error = %e, "catalog load failed; hiding element");
                    return false;
                }
            }
        } else {
            self.catalog.snapshot()
        };
        evaluate_visibility(&self.binding, &catalog, &self.session.snapshot(), self.empty_any_allows)
    }

    fn apply<E: Element>(&mut self, el: &mut E, visible: bool) {
        let next = if visible { Phase::Visible } else { Phase::Hidden };
        if next == self.phase {
            return;
        }
        match next {
            Phase::Visible => el.set_displayed(self.saved_display.unwrap_or(true)),
            _ => {
                // mount already hid it
                if self.phase != Phase::Pending {
                    el.set_displayed(false);
                }
            }
        }
        self.phase = next;
    }
}
