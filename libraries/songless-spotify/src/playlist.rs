//! Track source
//!
//! Loads a playlist's tracks in fixed-size pages, filters out entries
//! without a playable track object, and maps them to the session-facing
//! `Track` type.

use crate::error::{Result, SpotifyError};
use crate::types::PlaylistTracksPage;
use reqwest::Client;
use songless_core::Track;
use tracing::{debug, warn};

/// Default Web API base.
pub const API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Tracks fetched per request.
const PAGE_SIZE: usize = 100;

/// Safety cap: very large playlists are truncated rather than looped over.
const MAX_TRACKS: usize = 1000;

/// Read-only client for playlist contents.
pub struct PlaylistClient {
    http: Client,
    api_base: String,
}

impl PlaylistClient {
    pub fn new() -> Self {
        Self::with_api_base(API_BASE_URL)
    }

    /// Point at a different API base (tests).
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_base: api_base.into(),
        }
    }

    /// Load the ordered track list of `playlist_id`.
    ///
    /// Paginates until an empty page or the safety cap, whichever comes
    /// first. Entries whose track object is missing (removed or local
    /// files) are dropped.
    pub async fn load(&self, playlist_id: &str, bearer_token: &str) -> Result<Vec<Track>> {
        let mut tracks = Vec::new();
        let mut offset = 0;

        loop {
            let url = format!(
                "{}/playlists/{}/tracks?limit={}&offset={}",
                self.api_base, playlist_id, PAGE_SIZE, offset
            );
            debug!(url = %url, "Fetching playlist page");

            let response = self
                .http
                .get(&url)
                .bearer_auth(bearer_token)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(match status.as_u16() {
                    401 => SpotifyError::Unauthorized(message),
                    404 => SpotifyError::NotFound(format!("playlist {playlist_id}")),
                    code => SpotifyError::Upstream {
                        status: code,
                        message,
                    },
                });
            }

            let page: PlaylistTracksPage = response
                .json()
                .await
                .map_err(|e| SpotifyError::Parse(format!("Failed to parse playlist page: {e}")))?;

            if page.items.is_empty() {
                break;
            }

            tracks.extend(
                page.items
                    .into_iter()
                    .filter_map(|item| item.track)
                    .map(|track| track.into_track()),
            );
            offset += PAGE_SIZE;

            if offset >= MAX_TRACKS {
                warn!(playlist_id, "Playlist too large, stopping at {MAX_TRACKS} tracks");
                break;
            }
        }

        debug!(playlist_id, count = tracks.len(), "Playlist loaded");
        Ok(tracks)
    }
}

impl Default for PlaylistClient {
    fn default() -> Self {
        Self::new()
    }
}
