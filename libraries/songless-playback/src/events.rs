//! Session events
//!
//! Two directions of event flow:
//! - `BackendEvent`: pushed up from the playback backend at any time,
//!   including mid-clip. The session loop treats them as interrupts.
//! - `GameEvent`: emitted by the controller at transition points and drained
//!   by the session loop for the presentation layer. Progress updates are
//!   deliberately not events; they are published through the state snapshot.

use serde::{Deserialize, Serialize};

/// Lifecycle events pushed by the playback backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendEvent {
    /// Backend negotiated a connection and is accepting play commands
    Ready {
        /// Backend device identifier to address play commands to
        device_id: String,
    },

    /// Previously-ready device went offline
    NotReady { device_id: String },

    /// Credential rejected and a refresh attempt also failed
    AuthExpired { message: String },

    /// Account tier cannot stream audio; permanent for the session
    AccountIneligible { message: String },

    /// A play/pause command failed after being accepted
    PlaybackError { message: String },
}

/// Outcome of a resolved round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessResult {
    /// Whether the final guess matched the title
    pub is_correct: bool,

    /// The title, revealed to the player either way
    pub revealed_title: String,
}

/// Events emitted by the controller for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A stage clip (or timer-only stage) started
    StageStarted {
        track_index: usize,
        stage_index: usize,
        duration_ms: u64,
    },

    /// The stage-expiry timer fired; the clip is over
    StageExpired,

    /// A mismatched guess or skip advanced to a longer stage
    StageAdvanced { stage_index: usize },

    /// The round resolved, correctly or on the final miss
    RoundResolved { result: GuessResult },

    /// Moved on to the next track
    TrackAdvanced { track_index: usize },

    /// The last track's round was advanced past; session is over
    SessionCompleted,

    /// Audio playback is unavailable for this session; stages continue
    /// in timer-only mode
    AudioUnavailable { message: String },

    /// Credentials could not be refreshed; the player must log in again
    ReauthRequired { message: String },

    /// A best-effort backend call failed; the stage timer keeps running
    PlaybackIssue { message: String },
}
