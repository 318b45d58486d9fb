//! Event layer for Warden.
//!
//! - **Types** ([`AuthEvent`], [`Mutation`], [`Action`], [`ErrorContext`]):
//!   what gets published.
//! - **Bus** ([`EventBus`], [`EventSubscription`]): ordered fan-out to
//!   any number of subscribers, optionally filtered by dotted wildcard
//!   patterns such as `mutation.*` or `action.*.after`.
//!
//! # Architecture
//!
//! ```text
//! SessionStore ──mutation.*──┐
//! AuthActions ───action.*────┼──► EventBus ──► schedulers, router binding, host
//! schedulers ────error.*─────┘
//! ```

mod bus;
mod types;

pub use bus::{EventBus, EventSubscription};
pub use types::{
    Action, ActionOutcome, AuthEvent, ErrorContext, Mutation, User, name_matches,
};
