//! # Warden
//!
//! Client-side authentication session manager.
//!
//! Warden keeps the login state (token, user profile, "remember me"),
//! mirrors it into token storage, refreshes the token before it expires,
//! logs idle users out and redirects navigation the session no longer
//! permits. All I/O goes through driver traits, so the same session runs
//! against a real API or a scripted one.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use warden::prelude::*;
//!
//! let auth = Auth::builder(AuthConfig::default())
//!     .http(my_transport)
//!     .storage(MemoryTokenStorage::new())
//!     .build()
//!     .await?;
//!
//! auth.bind_router(Arc::new(my_router))?;
//! auth.attempt_login(json!({ "email": "ada@example.com", "password": "pw" }), true).await?;
//! assert!(auth.logged());
//! ```

mod auth;
mod error;
mod router;

pub use auth::{Auth, AuthBuilder};
pub use error::WardenError;

pub use warden_drivers as drivers;
pub use warden_event as event;
pub use warden_guard as guard;
pub use warden_session as session;
pub use warden_store as store;
pub use warden_timer as timer;

pub mod prelude {
    pub use crate::{Auth, AuthBuilder, WardenError};
    pub use warden_drivers::{
        Claims, DriverError, FileTokenStorage, HttpTransport, IdleDetector, IdleSignal, JwtDecoder,
        MemoryTokenStorage, Method, RequestConfig, Response, TokenDecoder, TokenStorage,
    };
    pub use warden_event::{Action, ActionOutcome, AuthEvent, EventBus, Mutation, User};
    pub use warden_guard::{GuardDecision, Location, MemoryRouter, Route, RouteRecord, Router};
    pub use warden_session::{AuthConfig, AuthError, AuthMethods, ConfigurationError, DefaultMethods};
    pub use warden_store::Snapshot;
}
