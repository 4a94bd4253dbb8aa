//! Core types for the guessing game

use serde::{Deserialize, Serialize};

/// Preview window lengths per stage, in milliseconds.
///
/// Stage `i` plays the track from position 0 for `STAGE_DURATIONS_MS[i]`
/// milliseconds. The table also defines the stage count: a round ends after
/// the last entry has been guessed against.
pub const STAGE_DURATIONS_MS: [u64; 6] = [500, 1000, 2000, 4000, 8000, 15000];

/// Number of reveal stages per track.
pub const STAGE_COUNT: usize = STAGE_DURATIONS_MS.len();

/// A playable track in a game session
///
/// Supplied once per session by the track source and never mutated. Eagerly
/// carries everything the game needs so no lookups happen mid-round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Backend URI used to start playback (e.g. `spotify:track:...`)
    pub uri: String,

    /// Track title, the guess target
    pub title: String,

    /// Full track duration in milliseconds
    pub duration_ms: u64,

    /// Album artwork URL, if any
    pub artwork_url: Option<String>,
}

impl Track {
    /// Create a track with no artwork.
    pub fn new(uri: impl Into<String>, title: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            uri: uri.into(),
            title: title.into(),
            duration_ms,
            artwork_url: None,
        }
    }
}
