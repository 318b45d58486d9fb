//! Session logic for Warden.
//!
//! - [`AuthActions`]: initialize, login, refresh, fetch user, logout
//! - [`AuthMethods`]: the overridable steps those actions are made of
//! - background tasks reacting to store mutations:
//!   [`spawn_refresh_scheduler`], [`spawn_idle_logout`], [`spawn_token_sync`]
//! - [`AuthConfig`] and the error types
//!
//! # How the pieces talk
//!
//! ```text
//! AuthActions ──commit──► SessionStore ──mutation.*──► EventBus
//!      ▲                                                  │
//!      │             ┌────────────────┬─────────────────┤
//!      │             ▼                ▼                 ▼
//!      └──refresh── refresher     idle logout       token sync ──► TokenStorage
//! ```

#![allow(async_fn_in_trait)]

mod actions;
mod config;
mod error;
mod idle;
mod methods;
mod refresher;
mod sync;
mod task;

pub use actions::AuthActions;
pub use config::{ApiEndpoints, AuthConfig, Endpoint};
pub use error::{AuthError, ConfigurationError};
pub use idle::spawn_idle_logout;
pub use methods::{AuthMethods, DefaultMethods};
pub use refresher::spawn_refresh_scheduler;
pub use sync::{SyncStatus, spawn_token_sync};
pub use task::TaskHandle;
