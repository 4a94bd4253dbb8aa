//! Playback backend adapter
//!
//! `PlayerClient` drives audio through the Web API's player endpoints, and
//! `ConnectBackend` adapts it to the session's `PlaybackBackend` contract.
//! Every command fetches a current token first; a 401 triggers exactly one
//! refresh-and-retry before the failure is escalated.

use crate::auth::TokenProvider;
use crate::error::{Result, SpotifyError};
use crate::types::{PlayRequest, TransferRequest};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use songless_core::Track;
use songless_playback::{BackendEvent, PlaybackBackend, PlaybackError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::playlist::API_BASE_URL;

/// Web API player-endpoint client.
pub struct PlayerClient<T: TokenProvider> {
    http: Client,
    api_base: String,
    tokens: Arc<T>,
}

impl<T: TokenProvider> PlayerClient<T> {
    pub fn new(tokens: Arc<T>) -> Self {
        Self::with_api_base(tokens, API_BASE_URL)
    }

    /// Point at a different API base (tests).
    pub fn with_api_base(tokens: Arc<T>, api_base: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_base: api_base.into(),
            tokens,
        }
    }

    /// Start playing `track` from `position_ms` on `device_id`.
    pub async fn play_on_device(
        &self,
        device_id: &str,
        track: &Track,
        position_ms: u64,
    ) -> Result<()> {
        let url = format!("{}/me/player/play?device_id={}", self.api_base, device_id);
        let body = PlayRequest {
            uris: vec![track.uri.clone()],
            position_ms,
        };
        let response = self
            .with_fresh_token(|token| self.http.put(&url).bearer_auth(token).json(&body))
            .await?;
        expect_command_accepted(response, "play").await
    }

    /// Stop audio output. Treats the "nothing is playing" restriction
    /// response as success so the call stays idempotent.
    pub async fn pause_playback(&self) -> Result<()> {
        let url = format!("{}/me/player/pause", self.api_base);
        let response = self
            .with_fresh_token(|token| self.http.put(&url).bearer_auth(token))
            .await?;

        if response.status().as_u16() == 403 {
            debug!("Pause while already paused, ignoring");
            return Ok(());
        }
        expect_command_accepted(response, "pause").await
    }

    /// Route playback to `device_id` without starting audio.
    pub async fn transfer_playback(&self, device_id: &str) -> Result<()> {
        let url = format!("{}/me/player", self.api_base);
        let body = TransferRequest {
            device_ids: vec![device_id.to_string()],
            play: false,
        };
        let response = self
            .with_fresh_token(|token| self.http.put(&url).bearer_auth(token).json(&body))
            .await?;
        expect_command_accepted(response, "transfer").await
    }

    /// Probe whether the account may stream audio: the player endpoint
    /// answers 403 for non-premium accounts.
    pub async fn check_premium(&self) -> Result<bool> {
        let url = format!("{}/me/player", self.api_base);
        let response = self
            .with_fresh_token(|token| self.http.get(&url).bearer_auth(token))
            .await?;
        Ok(response.status().as_u16() != 403)
    }

    /// Run a request with a fresh bearer token; on 401 refresh once and
    /// retry before giving up.
    async fn with_fresh_token(
        &self,
        build: impl Fn(&str) -> RequestBuilder,
    ) -> Result<Response> {
        let token = self.tokens.get_valid_token().await?;
        let response = build(&token).send().await?;

        if response.status().as_u16() != 401 {
            return Ok(response);
        }

        debug!("Token rejected upstream, refreshing and retrying once");
        let token = self.tokens.refresh_now().await?;
        Ok(build(&token).send().await?)
    }
}

async fn expect_command_accepted(response: Response, command: &str) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let message = response.text().await.unwrap_or_default();
    warn!(command, status = status.as_u16(), message = %message, "Player command rejected");
    Err(match status.as_u16() {
        401 => SpotifyError::Unauthorized(message),
        code => SpotifyError::Upstream {
            status: code,
            message,
        },
    })
}

/// `PlaybackBackend` implementation over the Web API player endpoints.
///
/// Lifecycle changes (readiness, failed refreshes, ineligible accounts) are
/// pushed through the `BackendEvent` channel handed in at connect time.
pub struct ConnectBackend<T: TokenProvider> {
    player: PlayerClient<T>,
    device_id: String,
    events: mpsc::UnboundedSender<BackendEvent>,
}

impl<T: TokenProvider> ConnectBackend<T> {
    /// Negotiate a usable connection around an already-registered device.
    ///
    /// Probes account eligibility, routes playback to the device and then
    /// announces `Ready` (or `AccountIneligible`) on `events`. The session
    /// may have been spawned before this completes; it defers stage starts
    /// until one of those events lands.
    pub async fn connect(
        player: PlayerClient<T>,
        device_id: impl Into<String>,
        events: mpsc::UnboundedSender<BackendEvent>,
    ) -> std::result::Result<Self, PlaybackError> {
        let device_id = device_id.into();

        match player.check_premium().await {
            Ok(true) => {}
            Ok(false) => {
                info!("Account cannot stream audio, announcing ineligibility");
                let _ = events.send(BackendEvent::AccountIneligible {
                    message: "Spotify Premium is required for audio playback".into(),
                });
                return Ok(Self {
                    player,
                    device_id,
                    events,
                });
            }
            Err(e) => return Err(Self::escalate(&events, e)),
        }

        if let Err(e) = player.transfer_playback(&device_id).await {
            return Err(Self::escalate(&events, e));
        }

        info!(device_id = %device_id, "Playback device ready");
        let _ = events.send(BackendEvent::Ready {
            device_id: device_id.clone(),
        });

        Ok(Self {
            player,
            device_id,
            events,
        })
    }

    /// Map a client error onto the playback taxonomy, announcing failed
    /// credential refreshes on the event channel.
    fn escalate(
        events: &mpsc::UnboundedSender<BackendEvent>,
        error: SpotifyError,
    ) -> PlaybackError {
        match error {
            SpotifyError::RefreshFailed(message) | SpotifyError::Unauthorized(message) => {
                let _ = events.send(BackendEvent::AuthExpired {
                    message: message.clone(),
                });
                PlaybackError::AuthExpired(message)
            }
            SpotifyError::Upstream { status, .. } => PlaybackError::PlaybackRejected { status },
            other => PlaybackError::BackendUnavailable(other.to_string()),
        }
    }
}

#[async_trait]
impl<T: TokenProvider> PlaybackBackend for ConnectBackend<T> {
    async fn play(&self, track: &Track, position_ms: u64) -> songless_playback::Result<()> {
        self.player
            .play_on_device(&self.device_id, track, position_ms)
            .await
            .map_err(|e| Self::escalate(&self.events, e))
    }

    async fn pause(&self) -> songless_playback::Result<()> {
        self.player
            .pause_playback()
            .await
            .map_err(|e| Self::escalate(&self.events, e))
    }

    async fn disconnect(&self) {
        // Nothing to release server-side; the registered device outlives us.
        debug!(device_id = %self.device_id, "Disconnecting playback backend");
    }
}
