use thiserror::Error;

/// Failures of the bot-token lifecycle.
///
/// The variants carry plain messages rather than source errors so a failed
/// attempt's outcome can be cloned out to every caller that waited on it.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The initial login failed; the service cannot come up without a token.
    #[error("initial login failed: {0}")]
    StartupFailed(String),

    /// A refresh attempt failed, or waiting for one timed out.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// A token was requested before any successful login.
    #[error("not authenticated: no token has been issued yet")]
    NotAuthenticated,
}
