//! Wire types for the Spotify Web API and accounts service.

use serde::{Deserialize, Serialize};

/// Tokens returned by the accounts token endpoint.
///
/// `refresh_token` is optional on refresh grants; callers keep the previous
/// one when it is absent.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: u64,
}

/// One page of a playlist's tracks.
#[derive(Debug, Deserialize)]
pub struct PlaylistTracksPage {
    pub items: Vec<PlaylistItem>,
}

/// A playlist entry; `track` is absent for removed or unplayable entries.
#[derive(Debug, Deserialize)]
pub struct PlaylistItem {
    pub track: Option<ApiTrack>,
}

/// Track object as returned inside playlist pages.
#[derive(Debug, Deserialize)]
pub struct ApiTrack {
    pub uri: String,
    pub name: String,
    pub duration_ms: u64,
    #[serde(default)]
    pub album: Option<ApiAlbum>,
}

#[derive(Debug, Deserialize)]
pub struct ApiAlbum {
    #[serde(default)]
    pub images: Vec<ApiImage>,
}

#[derive(Debug, Deserialize)]
pub struct ApiImage {
    pub url: String,
}

/// Body of `PUT /v1/me/player/play`.
#[derive(Debug, Serialize)]
pub struct PlayRequest {
    pub uris: Vec<String>,
    pub position_ms: u64,
}

/// Body of `PUT /v1/me/player` (transfer playback to a device).
#[derive(Debug, Serialize)]
pub struct TransferRequest {
    pub device_ids: Vec<String>,
    pub play: bool,
}

impl ApiTrack {
    /// Convert to the session-facing track type, taking the first (largest)
    /// album image as artwork.
    pub fn into_track(self) -> songless_core::Track {
        let artwork_url = self
            .album
            .and_then(|album| album.images.into_iter().next())
            .map(|image| image.url);
        songless_core::Track {
            uri: self.uri,
            title: self.name,
            duration_ms: self.duration_ms,
            artwork_url,
        }
    }
}
