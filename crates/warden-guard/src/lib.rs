//! Navigation guard for Warden.
//!
//! Routes declare what they require through metadata on their matched
//! records (by default `auth: true` for logged-in users only and
//! `auth: false` for guests only). The guard turns that plus the
//! session snapshot into a [`GuardDecision`]:
//!
//! | ready | route requires   | logged | decision                       |
//! |-------|------------------|--------|--------------------------------|
//! | no    | anything         | any    | allow                          |
//! | yes   | authenticated    | no     | redirect to login (`nextUrl`)  |
//! | yes   | unauthenticated  | yes    | redirect to home               |
//! | yes   | otherwise        | any    | allow                          |

mod decision;
mod error;
mod guard;
mod route;
mod router;

pub use decision::{AccessRequirement, AuthMeta, GuardConfig, GuardDecision, Redirects, decide};
pub use error::GuardError;
pub use guard::NavigationGuard;
pub use route::{Location, Route, RouteRecord};
pub use router::{MemoryRouter, Router};
