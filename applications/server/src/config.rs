/// Server configuration
use crate::error::{Result, ServerError};
use serde::{Deserialize, Serialize};

/// Environment variables the Spotify integration cannot run without.
pub const REQUIRED_ENV_VARS: [&str; 3] = [
    "SPOTIFY_CLIENT_ID",
    "SPOTIFY_CLIENT_SECRET",
    "SPOTIFY_REDIRECT_URI",
];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_server")]
    pub server: ServerSettings,

    #[serde(default = "default_spotify")]
    pub spotify: SpotifySettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpotifySettings {
    /// OAuth client id, shown to browsers so they can start the login flow.
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret, never leaves the server.
    #[serde(default)]
    pub client_secret: String,

    /// Redirect URI registered for the OAuth app.
    #[serde(default)]
    pub redirect_uri: String,

    /// Playlist the game draws tracks from when the player has no override.
    #[serde(default)]
    pub default_playlist_id: Option<String>,
}

impl ServerConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder();

        // Load from config file if it exists
        let config_path = std::path::PathBuf::from("config.toml");
        if config_path.exists() {
            settings = settings.add_source(config::File::from(config_path));
        }

        // Override with environment variables (prefixed with SONGLESS_)
        settings = settings.add_source(
            config::Environment::with_prefix("SONGLESS")
                .separator("_")
                .try_parsing(true),
        );

        // The unprefixed Spotify variables win; they are the names the
        // deployment scripts and the check-env command use.
        settings = settings
            .set_override_option("spotify.client_id", env_var("SPOTIFY_CLIENT_ID"))
            .map_err(|e| ServerError::Config(e.to_string()))?
            .set_override_option("spotify.client_secret", env_var("SPOTIFY_CLIENT_SECRET"))
            .map_err(|e| ServerError::Config(e.to_string()))?
            .set_override_option("spotify.redirect_uri", env_var("SPOTIFY_REDIRECT_URI"))
            .map_err(|e| ServerError::Config(e.to_string()))?
            .set_override_option(
                "spotify.default_playlist_id",
                env_var("SPOTIFY_DEFAULT_PLAYLIST_ID"),
            )
            .map_err(|e| ServerError::Config(e.to_string()))?;

        let config = settings
            .build()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.spotify.client_id.is_empty() {
            return Err(ServerError::Config(
                "Spotify client id is required (set SPOTIFY_CLIENT_ID)".to_string(),
            ));
        }
        if self.spotify.client_secret.is_empty() {
            return Err(ServerError::Config(
                "Spotify client secret is required (set SPOTIFY_CLIENT_SECRET)".to_string(),
            ));
        }
        if self.spotify.redirect_uri.is_empty() {
            return Err(ServerError::Config(
                "Spotify redirect URI is required (set SPOTIFY_REDIRECT_URI)".to_string(),
            ));
        }

        Ok(())
    }
}

/// Names from `REQUIRED_ENV_VARS` that are unset or empty.
pub fn missing_env_vars() -> Vec<&'static str> {
    REQUIRED_ENV_VARS
        .iter()
        .copied()
        .filter(|name| env_var(name).is_none())
        .collect()
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// Default values
fn default_server() -> ServerSettings {
    ServerSettings {
        host: default_host(),
        port: default_port(),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_spotify() -> SpotifySettings {
    SpotifySettings {
        client_id: String::new(),
        client_secret: String::new(),
        redirect_uri: String::new(),
        default_playlist_id: None,
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            spotify: default_spotify(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_missing_credentials() {
        let config = ServerConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_full_credentials() {
        let config = ServerConfig {
            spotify: SpotifySettings {
                client_id: "id".into(),
                client_secret: "secret".into(),
                redirect_uri: "http://localhost:3000/callback".into(),
                default_playlist_id: None,
            },
            ..ServerConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
