//! Error types for the Spotify clients.

use thiserror::Error;

/// Errors that can occur when talking to the Spotify Web API or the
/// accounts token endpoint.
#[derive(Error, Debug)]
pub enum SpotifyError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Bearer token was rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Refresh grant was rejected; the player must log in again
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// No credential is held at all
    #[error("No token available")]
    NoToken,

    /// Any other non-2xx upstream response
    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// Failed to parse an upstream response
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

/// Result type for Spotify client operations.
pub type Result<T> = std::result::Result<T, SpotifyError>;
