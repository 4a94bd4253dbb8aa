/// Shared application state
use crate::config::ServerConfig;
use songless_spotify::{AuthClient, PlaylistClient};
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub auth: Arc<AuthClient>,
    pub playlists: Arc<PlaylistClient>,
}

impl AppState {
    pub fn new(
        config: Arc<ServerConfig>,
        auth: Arc<AuthClient>,
        playlists: Arc<PlaylistClient>,
    ) -> Self {
        Self {
            config,
            auth,
            playlists,
        }
    }
}
