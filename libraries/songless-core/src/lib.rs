//! Songless Core
//!
//! Shared domain types and game rules for Songless.
//!
//! This crate defines:
//! - **Domain Types**: `Track` and the fixed stage duration table
//! - **Game Rules**: title matching for guesses
//! - **Shuffle**: uniform pre-session track shuffling
//!
//! It is deliberately free of I/O and async machinery so that the playback
//! controller and the Spotify clients can share it without pulling in either
//! side's stack.
//!
//! # Example
//!
//! ```rust
//! use songless_core::{guess_matches, Track, STAGE_DURATIONS_MS};
//!
//! let track = Track::new("spotify:track:abc123", "Bohemian Rhapsody", 354_000);
//!
//! assert!(guess_matches("bohemian", &track.title));
//! assert_eq!(STAGE_DURATIONS_MS.len(), 6);
//! ```

pub mod guess;
pub mod shuffle;
pub mod types;

pub use guess::guess_matches;
pub use shuffle::shuffle_tracks;
pub use types::{Track, STAGE_COUNT, STAGE_DURATIONS_MS};
