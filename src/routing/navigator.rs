//! Serialized navigation over a route table and a guard.
//!
//! Every `push` takes a ticket before queueing on the transition lock. When its guard
//! verdict arrives, the transition commits only if no newer push was issued meanwhile;
//! otherwise it reports `Superseded` and its redirect is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{Location, NavigationDecision, NavigationGuard, RouteMatch, RouteTable};
use crate::error::GateError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Committed(RouteMatch),
    /// A newer navigation was requested before this one finished.
    Superseded,
    Failed(GateError),
}

impl NavigationOutcome {
    pub fn committed(&self) -> Option<&RouteMatch> {
        match self {
            NavigationOutcome::Committed(m) => Some(m),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryMode {
    Push,
    Back,
}

#[derive(Default)]
struct NavState {
    current: Option<RouteMatch>,
    history: Vec<String>,
}

pub struct Navigator {
    table: Arc<RouteTable>,
    guard: NavigationGuard,
    max_redirects: usize,
    latest: AtomicU64,
    transition: Mutex<()>,
    state: RwLock<NavState>,
}

impl Navigator {
    pub fn new(table: Arc<RouteTable>, guard: NavigationGuard, max_redirects: usize) -> Self {
        Self { table, guard, max_redirects, latest: AtomicU64::new(0), transition: Mutex::new(()), state: RwLock::new(NavState::default()) }
    }

    pub fn table(&self) -> &RouteTable { &self.table }
    pub fn current(&self) -> Option<RouteMatch> { self.state.read().current.clone() }
    pub fn history(&self) -> Vec<String> { self.state.read().history.clone() }

    pub async fn push<L: Into<Location>>(&self, to: L) -> NavigationOutcome {
        self.navigate(to.into(), HistoryMode::Push).await
    }

    /// Re-navigate to the previous history entry; it goes through the guard again.
    pub async fn back(&self) -> NavigationOutcome {
        let prev = {
            let st = self.state.read();
            let n = st.history.len();
            if n < 2 { None } else { Some(st.history[n - 2].clone()) }
        };
        match prev {
            Some(path) => self.navigate(Location::path(&path), HistoryMode::Back).await,
            None => NavigationOutcome::Failed(GateError::route_not_found("no previous history entry")),
        }
    }

    async fn navigate(&self, to: Location, mode: HistoryMode) -> NavigationOutcome {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let _turn = self.transition.lock().await;

        let mut target = to;
        let mut hops = 0usize;
        loop {
            if self.latest.load(Ordering::SeqCst) != ticket {
                return NavigationOutcome::Superseded;
            }
            let matched = match self.table.resolve(&target) {
                Ok(m) => m,
                Err(e) => {
                    warn!(target: "navigator", error = %e, "navigation target did not resolve");
                    return NavigationOutcome::Failed(e);
                }
            };
            let decision = self.guard.check(&matched).await;
            if self.latest.load(Ordering::SeqCst) != ticket {
                debug!(target: "navigator", to = %matched.full_path, "verdict discarded; newer navigation pending");
                return NavigationOutcome::Superseded;
            }
            match decision {
                NavigationDecision::Allow => {
                    self.commit(&matched, mode);
                    info!(target: "navigator", to = %matched.full_path, hops, "navigation committed");
                    return NavigationOutcome::Committed(matched);
                }
                NavigationDecision::Redirect(next) => {
                    hops += 1;
                    if hops > self.max_redirects {
                        warn!(target: "navigator", from = %matched.full_path, hops, "redirect limit reached");
                        return NavigationOutcome::Failed(GateError::configuration(format!(
                            "more than {} redirects starting from {}",
                            self.max_redirects, matched.full_path
                        )));
                    }
                    debug!(target: "navigator", from = %matched.full_path, to = ?next.target, "following redirect");
                    target = next;
                }
            }
        }
    }

    fn commit(&self, m: &RouteMatch, mode: HistoryMode) {
        let mut st = self.state.write();
        if mode == HistoryMode::Back {
            // drop the entry being left and the one being returned to; the committed path replaces them
            let keep = st.history.len().saturating_sub(2);
            st.history.truncate(keep);
        }
        st.history.push(m.full_path.clone());
        st.current = Some(m.clone());
    }
}
