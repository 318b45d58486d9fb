use parking_lot::Mutex;
use tracing::debug;

use crate::{GuardError, Location, Route, RouteRecord};

/// The host application's router, as seen by the guard.
pub trait Router: Send + Sync + 'static {
    /// The route currently displayed, if navigation has happened yet.
    fn current_route(&self) -> Option<Route>;

    /// Navigates to `location`.
    fn push(&self, location: Location) -> Result<(), GuardError>;
}

/// A router over a static route table, kept in memory.
///
/// Resolves a location by collecting every record whose path is a
/// segment-wise prefix of it, shortest first, and records every
/// navigation in a history list.
#[derive(Debug, Default)]
pub struct MemoryRouter {
    records: Vec<RouteRecord>,
    current: Mutex<Option<Route>>,
    history: Mutex<Vec<Location>>,
}

impl MemoryRouter {
    pub fn new(records: Vec<RouteRecord>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    /// Resolves `location` against the route table.
    pub fn resolve(&self, location: Location) -> Route {
        let mut matched: Vec<RouteRecord> = self
            .records
            .iter()
            .filter(|r| r.matches_path(&location.path))
            .cloned()
            .collect();
        matched.sort_by_key(|r| r.path.len());
        Route::new(location, matched)
    }

    /// Every location pushed so far, oldest first.
    pub fn history(&self) -> Vec<Location> {
        self.history.lock().clone()
    }
}

impl Router for MemoryRouter {
    fn current_route(&self) -> Option<Route> {
        self.current.lock().clone()
    }

    fn push(&self, location: Location) -> Result<(), GuardError> {
        debug!(to = %location.full_path(), "navigating");
        let route = self.resolve(location.clone());
        *self.current.lock() = Some(route);
        self.history.lock().push(location);
        Ok(())
    }
}
