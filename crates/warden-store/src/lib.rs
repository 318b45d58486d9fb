//! Session state for Warden.
//!
//! [`SessionStore`] owns the token, the user profile, the "remember me"
//! flag and the readiness flag. State only changes through its named
//! mutations, and each mutation is published on the
//! [`EventBus`](warden_event::EventBus) as `mutation.<name>`.
//!
//! ```text
//! created ──set_token(Some)──► logged ──logout──► not logged
//!    │                                             │
//!    └─────────────set_ready (once)────────────────┘
//! ```
//!
//! `logged` is derived from the token and never stored, so the two can
//! not disagree.

mod state;
mod store;

pub use state::{Generation, SessionState, Snapshot};
pub use store::SessionStore;
