/// Spotify API routes
///
/// Thin proxy layer in front of the Spotify clients: the browser never sees
/// the client secret, and the playlist endpoint hides the Web API paging.
use crate::{
    error::{Result, ServerError},
    state::AppState,
};
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use songless_core::Track;

#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistQuery {
    pub playlist_id: String,
}

#[derive(Debug, Serialize)]
pub struct PlaylistResponse {
    pub tracks: Vec<Track>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfigResponse {
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_playlist_id: Option<String>,
}

/// POST /api/spotify/callback - exchange an authorization code for tokens
pub async fn callback(
    State(app_state): State<AppState>,
    Json(req): Json<CallbackRequest>,
) -> Result<Json<TokenResponse>> {
    let grant = app_state
        .auth
        .exchange_code(&req.code, &app_state.config.spotify.redirect_uri)
        .await?;

    Ok(Json(TokenResponse {
        access_token: grant.access_token,
        refresh_token: grant.refresh_token,
        expires_in: grant.expires_in,
    }))
}

/// POST /api/spotify/refresh - redeem a refresh token
pub async fn refresh(
    State(app_state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>> {
    let grant = app_state.auth.refresh(&req.refresh_token).await?;

    Ok(Json(TokenResponse {
        access_token: grant.access_token,
        refresh_token: grant.refresh_token,
        expires_in: grant.expires_in,
    }))
}

/// GET /api/spotify/playlist?playlistId=... - load a playlist's tracks
///
/// The caller's own access token comes in as a bearer header; playlist reads
/// run under the player's account, not a server credential.
pub async fn playlist(
    State(app_state): State<AppState>,
    Query(query): Query<PlaylistQuery>,
    headers: HeaderMap,
) -> Result<Json<PlaylistResponse>> {
    let token = bearer_token(&headers)?;
    let tracks = app_state.playlists.load(&query.playlist_id, token).await?;

    if tracks.is_empty() {
        return Err(ServerError::NotFound(format!(
            "Playlist {} has no playable tracks",
            query.playlist_id
        )));
    }

    Ok(Json(PlaylistResponse { tracks }))
}

/// GET /api/spotify/config - public OAuth parameters for the browser
pub async fn client_config(State(app_state): State<AppState>) -> Json<ClientConfigResponse> {
    Json(ClientConfigResponse {
        client_id: app_state.config.spotify.client_id.clone(),
        redirect_uri: app_state.config.spotify.redirect_uri.clone(),
        default_playlist_id: app_state.config.spotify.default_playlist_id.clone(),
    })
}

fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ServerError::Auth("Missing bearer token".to_string()))
}
