//! Pre-session track shuffling
//!
//! Sessions optionally shuffle the track list once before the first round.
//! Uses Fisher-Yates so every permutation is equally likely.

use crate::types::Track;
use rand::seq::SliceRandom;
use rand::thread_rng;

/// Shuffle tracks in place with a uniform permutation.
pub fn shuffle_tracks(tracks: &mut [Track]) {
    let mut rng = thread_rng();
    tracks.shuffle(&mut rng);
}
