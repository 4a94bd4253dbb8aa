//! Playback backend contract
//!
//! The backend is externally owned and inherently asynchronous: it announces
//! readiness on its own schedule and its commands are network round trips.
//! Implementations surface lifecycle changes through a `BackendEvent` channel
//! handed to the session at construction; this trait only covers the command
//! side.
//!
//! Methods take `&self` so an in-flight `play` can overlap with the session
//! loop issuing newer commands; implementations are expected to be cheap to
//! share (an HTTP client, a channel sender).

use crate::error::Result;
use async_trait::async_trait;
use songless_core::Track;

/// Command interface to the external audio backend
#[async_trait]
pub trait PlaybackBackend: Send + Sync + 'static {
    /// Start playing `track` at `position_ms`.
    ///
    /// Only valid once the backend has announced `Ready`; fails with
    /// `PlaybackRejected` otherwise.
    async fn play(&self, track: &Track, position_ms: u64) -> Result<()>;

    /// Stop audio output. Idempotent if already paused.
    async fn pause(&self) -> Result<()>;

    /// Release the connection. Safe to call even if never connected.
    async fn disconnect(&self);
}
