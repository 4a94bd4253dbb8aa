//! Spotify integration for the guessing game.
//!
//! Three concerns live here, each behind its own client:
//!
//! - [`auth`]: confidential-client grants against the accounts service and
//!   the [`TokenManager`] that keeps an access token fresh.
//! - [`playlist`]: paged loading of a playlist's tracks.
//! - [`player`]: the Web API player endpoints, wrapped into a
//!   [`ConnectBackend`] that the playback session can drive.
//!
//! Nothing in this crate knows about game rules; it maps HTTP responses onto
//! the track and backend types of `songless-core` / `songless-playback`.

pub mod auth;
pub mod error;
pub mod player;
pub mod playlist;
pub mod types;

pub use auth::{AuthClient, TokenManager, TokenProvider, ACCOUNTS_TOKEN_URL};
pub use error::{Result, SpotifyError};
pub use player::{ConnectBackend, PlayerClient};
pub use playlist::{PlaylistClient, API_BASE_URL};
pub use types::TokenGrant;
