//! Error types for session playback

use thiserror::Error;

/// Errors from the stage playback controller and backend adapters
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Session was created with an empty track list
    #[error("Track list is empty")]
    NoTracks,

    /// Guess text was empty or whitespace-only
    #[error("Guess is empty")]
    EmptyGuess,

    /// Operation is not valid in the current phase
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Session already reached its terminal state
    #[error("Session is complete")]
    SessionComplete,

    /// Backend connection never became ready
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Backend rejected a play/pause command
    #[error("Playback rejected (status {status})")]
    PlaybackRejected { status: u16 },

    /// Credential could not be obtained or refreshed
    #[error("Authentication expired: {0}")]
    AuthExpired(String),

    /// Session task is gone (handle outlived the loop)
    #[error("Session closed")]
    SessionClosed,
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
