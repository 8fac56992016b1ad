//! Error types for the session layer.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors that can occur while refreshing a session credential.
///
/// `Clone` is required so that a single refresh settlement can be handed
/// to every request that joined the in-flight operation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// No refresh endpoint is configured, or the refresh credential
    /// required by the current mode is missing from the store.
    #[error("Refresh unavailable: {0}")]
    RefreshUnavailable(String),

    /// Network/HTTP error during the refresh call.
    #[error("Network error: {0}")]
    Network(String),

    /// The refresh endpoint returned a non-success status.
    #[error("Refresh rejected ({status}): {message}")]
    Backend {
        /// HTTP status code returned by the refresh endpoint.
        status: u16,
        /// Response body, as text.
        message: String,
    },

    /// The refresh response body did not have the expected shape.
    #[error("Malformed refresh response: {0}")]
    Malformed(String),
}
