use tracing::{debug, info};
use warden_store::SessionStore;

use crate::{GuardConfig, GuardDecision, GuardError, Location, Route, Router, decide};

/// Applies [`decide`] to the live session.
#[derive(Debug, Clone)]
pub struct NavigationGuard {
    store: SessionStore,
    config: GuardConfig,
}

impl NavigationGuard {
    pub fn new(store: SessionStore, config: GuardConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Pre-navigation check for a transition to `to`.
    pub fn before_each(&self, to: &Route) -> GuardDecision {
        let decision = decide(to, &self.store.snapshot(), &self.config);
        if let GuardDecision::Redirect(target) = &decision {
            debug!(from = %to.full_path(), to = %target.full_path(), "navigation redirected");
        }
        decision
    }

    /// Re-checks the route the router currently shows and pushes a
    /// redirect if the session no longer permits it.
    ///
    /// Returns the location pushed, if any. A redirect to the path already
    /// displayed is skipped.
    pub fn redirect_if_needed(&self, router: &dyn Router) -> Result<Option<Location>, GuardError> {
        let Some(current) = router.current_route() else {
            return Ok(None);
        };
        match decide(&current, &self.store.snapshot(), &self.config) {
            GuardDecision::Allow => Ok(None),
            GuardDecision::Redirect(target) if target.path == current.path() => Ok(None),
            GuardDecision::Redirect(target) => {
                info!(from = %current.full_path(), to = %target.full_path(), "session change forces redirect");
                router.push(target.clone())?;
                Ok(Some(target))
            }
        }
    }
}
