//! Session state types
//!
//! `SessionSnapshot` is the read-only view handed to the presentation layer.
//! All mutation happens inside the controller; presentation only reads
//! snapshots and submits intents.

use serde::{Deserialize, Serialize};

/// Playback phase within the current round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackPhase {
    /// No clip playing; a stage can be started
    Idle,

    /// Clip audible (or timer-only fallback running)
    Playing,

    /// Stage expiry fired; awaiting a guess, skip or restart
    Paused,

    /// Round resolved (correct guess or final miss); awaiting track advance
    Completed,
}

/// Immutable view of session state for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Index of the current track; equals `track_count` once the session
    /// is complete
    pub track_index: usize,

    /// Total number of tracks in the session
    pub track_count: usize,

    /// Current stage (0..=5)
    pub stage_index: usize,

    /// Preview length of the current stage in milliseconds
    pub stage_duration_ms: u64,

    /// Phase of the current round
    pub phase: PlaybackPhase,

    /// Progress within the current stage, 0.0..=1.0
    pub elapsed_fraction: f32,

    /// Whether the backend has announced a usable device
    pub backend_ready: bool,

    /// False once the account was reported ineligible for audio playback;
    /// the session then runs in timer-only mode
    pub audio_capable: bool,

    /// True once the last track's round has been advanced past
    pub session_complete: bool,
}

impl SessionSnapshot {
    /// Whether the current round is resolved and waiting on track advance.
    pub fn round_resolved(&self) -> bool {
        self.phase == PlaybackPhase::Completed
    }
}
