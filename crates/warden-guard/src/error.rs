/// Errors raised while applying a guard decision.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// The router refused or failed the navigation.
    #[error("navigation to {location} failed: {reason}")]
    NavigationFailed { location: String, reason: String },
}
