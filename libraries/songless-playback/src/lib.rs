//! Songless - Stage Playback
//!
//! The stage playback controller for Songless: which track, which reveal
//! stage, whether audio is live, and what guesses, skips and stage-expiry
//! timeouts do to the session.
//!
//! # Architecture
//!
//! - [`controller::GameController`] is a synchronous state machine. Timer
//!   fires and backend completions are plain method calls tagged with a
//!   stage epoch, which makes stale-input handling and unit testing
//!   trivial.
//! - [`session::GameSession`] wraps the controller in a single tokio task
//!   that owns the timers, the backend connection and all channels. The
//!   presentation layer holds a [`session::SessionHandle`] and only ever
//!   reads snapshots and submits intents.
//! - The audio backend is behind the [`backend::PlaybackBackend`] trait and
//!   pushes lifecycle changes (`Ready`, `AuthExpired`, `AccountIneligible`,
//!   ...) through a channel of [`events::BackendEvent`].
//!
//! The crate never talks to Spotify directly; `songless-spotify` provides
//! the concrete backend and track/credential sources.

pub mod backend;
pub mod controller;
pub mod error;
pub mod events;
pub mod session;
pub mod state;

// Public exports
pub use backend::PlaybackBackend;
pub use controller::{GameController, GuessOutcome, StagePlan};
pub use error::{PlaybackError, Result};
pub use events::{BackendEvent, GameEvent, GuessResult};
pub use session::{GameSession, SessionHandle};
pub use state::{PlaybackPhase, SessionSnapshot};
