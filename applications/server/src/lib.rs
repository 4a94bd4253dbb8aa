//! Songless Server Library
//!
//! Backend for the track-guessing game: keeps the Spotify client secret
//! server-side, exchanges and refreshes OAuth tokens, and serves playlist
//! contents to the browser.
//!
//! This library exposes the router and state for testing purposes.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

pub mod api;
pub mod config;
pub mod error;
pub mod state;

// Re-export commonly used types for convenience
pub use config::{ServerConfig, REQUIRED_ENV_VARS};
pub use error::{Result, ServerError};
pub use state::AppState;

/// Build the application router.
pub fn create_router(app_state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(api::health::health))
        .route("/spotify/callback", post(api::spotify::callback))
        .route("/spotify/refresh", post(api::spotify::refresh))
        .route("/spotify/playlist", get(api::spotify::playlist))
        .route("/spotify/config", get(api::spotify::client_config));

    Router::new()
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false)),
        )
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
