//! Stage playback controller
//!
//! Owns the session state machine: which track, which stage, whether a clip
//! is playing, and what guesses/skips/timeouts do. The controller itself is
//! synchronous; timers and backend completions are injected as inputs by the
//! session loop, each tagged with the stage **epoch** current when they were
//! created. Every transition out of a stage bumps the epoch, so a stale
//! timer fire or a completion for a superseded `play` call is a no-op.
//!
//! Phases per round: `Idle -> Playing -> (Paused | Completed)`. `Paused`
//! only returns to `Idle` through stage or track advance; each stage restart
//! plays from position 0.

use crate::error::{PlaybackError, Result};
use crate::events::{BackendEvent, GameEvent, GuessResult};
use crate::state::{PlaybackPhase, SessionSnapshot};
use songless_core::{guess_matches, Track, STAGE_COUNT, STAGE_DURATIONS_MS};
use std::time::Duration;
use tracing::{debug, warn};

/// Instructions for the session loop after a stage begins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    /// Epoch the stage's timers and play completion must carry
    pub epoch: u64,

    /// Stage length; the expiry timer is armed for this long
    pub duration: Duration,

    /// Track to start playing, or `None` in timer-only fallback mode
    pub track: Option<Track>,
}

/// What the session loop must do after a guess or skip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuessOutcome {
    /// Resolved round result, if the guess ended the round
    pub result: Option<GuessResult>,

    /// Whether audio was playing and needs a best-effort pause
    pub needs_pause: bool,
}

/// The session state machine
pub struct GameController {
    tracks: Vec<Track>,
    track_index: usize,
    stage_index: usize,
    phase: PlaybackPhase,
    elapsed_fraction: f32,
    backend_ready: bool,
    device_id: Option<String>,
    audio_capable: bool,
    session_complete: bool,
    start_pending: bool,
    epoch: u64,
    pending_events: Vec<GameEvent>,
}

impl GameController {
    /// Create a controller for a non-empty track list.
    pub fn new(tracks: Vec<Track>) -> Result<Self> {
        if tracks.is_empty() {
            return Err(PlaybackError::NoTracks);
        }

        Ok(Self {
            tracks,
            track_index: 0,
            stage_index: 0,
            phase: PlaybackPhase::Idle,
            elapsed_fraction: 0.0,
            backend_ready: false,
            device_id: None,
            audio_capable: true,
            session_complete: false,
            start_pending: false,
            epoch: 0,
            pending_events: Vec::new(),
        })
    }

    // ===== Snapshots and events =====

    /// Current read-only state for the presentation layer.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            track_index: self.track_index,
            track_count: self.tracks.len(),
            stage_index: self.stage_index,
            stage_duration_ms: STAGE_DURATIONS_MS[self.stage_index],
            phase: self.phase,
            elapsed_fraction: self.elapsed_fraction,
            backend_ready: self.backend_ready,
            audio_capable: self.audio_capable,
            session_complete: self.session_complete,
        }
    }

    /// Drain all events emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// The track the current round is guessing against.
    pub fn current_track(&self) -> &Track {
        &self.tracks[self.track_index.min(self.tracks.len() - 1)]
    }

    /// Epoch of the current stage; inputs carrying an older value are stale.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    // ===== Backend lifecycle =====

    /// Absorb a backend lifecycle event.
    ///
    /// May return a `StagePlan` when readiness (or the ineligible-account
    /// fallback) releases a deferred `start_stage`.
    pub fn handle_backend_event(&mut self, event: BackendEvent) -> Option<StagePlan> {
        match event {
            BackendEvent::Ready { device_id } => {
                debug!(device_id = %device_id, "Backend ready");
                self.backend_ready = true;
                self.device_id = Some(device_id);
                self.take_pending_start()
            }
            BackendEvent::NotReady { device_id } => {
                debug!(device_id = %device_id, "Backend device went offline");
                self.backend_ready = false;
                None
            }
            BackendEvent::AuthExpired { message } => {
                // The adapter already refreshed and retried once; reaching
                // here means the session cannot continue. A clip may still be
                // mid-stage, so the phase must not stay Playing with no live
                // timer behind it.
                warn!(message = %message, "Credential refresh failed, ending session");
                self.cancel_stage();
                self.phase = PlaybackPhase::Idle;
                self.elapsed_fraction = 0.0;
                self.session_complete = true;
                self.pending_events
                    .push(GameEvent::ReauthRequired { message });
                None
            }
            BackendEvent::AccountIneligible { message } => {
                warn!(message = %message, "Account cannot stream audio, falling back to timer-only stages");
                self.audio_capable = false;
                self.pending_events
                    .push(GameEvent::AudioUnavailable { message });
                self.take_pending_start()
            }
            BackendEvent::PlaybackError { message } => {
                warn!(message = %message, "Backend playback error");
                self.pending_events
                    .push(GameEvent::PlaybackIssue { message });
                None
            }
        }
    }

    fn take_pending_start(&mut self) -> Option<StagePlan> {
        if self.start_pending && self.can_start_now() {
            self.start_pending = false;
            Some(self.begin_stage())
        } else {
            None
        }
    }

    fn can_start_now(&self) -> bool {
        !self.session_complete
            && self.phase == PlaybackPhase::Idle
            && (self.backend_ready || !self.audio_capable)
    }

    // ===== Intents =====

    /// Start the current stage's clip.
    ///
    /// Valid only from `Idle`. Returns the plan for the session loop, or
    /// `None` when the backend is not yet ready; the start is then parked
    /// and released by the next `Ready` (or `AccountIneligible`) event.
    pub fn start_stage(&mut self) -> Result<Option<StagePlan>> {
        if self.session_complete {
            return Err(PlaybackError::SessionComplete);
        }
        if self.phase != PlaybackPhase::Idle {
            return Err(PlaybackError::InvalidOperation(format!(
                "start_stage is only valid from Idle, not {:?}",
                self.phase
            )));
        }

        if self.audio_capable && !self.backend_ready {
            debug!("Backend not ready, deferring stage start");
            self.start_pending = true;
            return Ok(None);
        }

        Ok(Some(self.begin_stage()))
    }

    fn begin_stage(&mut self) -> StagePlan {
        self.epoch += 1;
        self.phase = PlaybackPhase::Playing;
        self.elapsed_fraction = 0.0;

        let duration_ms = STAGE_DURATIONS_MS[self.stage_index];
        self.pending_events.push(GameEvent::StageStarted {
            track_index: self.track_index,
            stage_index: self.stage_index,
            duration_ms,
        });

        StagePlan {
            epoch: self.epoch,
            duration: Duration::from_millis(duration_ms),
            track: self
                .audio_capable
                .then(|| self.tracks[self.track_index].clone()),
        }
    }

    /// Evaluate a guess. Valid from any phase except `Completed`; a late
    /// guess after expiry (in `Paused`) still counts.
    ///
    /// Whitespace-only input is rejected without consuming a stage. A
    /// mismatch below the last stage advances to `Idle` for the caller to
    /// start the longer clip; a match or final mismatch resolves the round.
    pub fn submit_guess(&mut self, text: &str) -> Result<GuessOutcome> {
        if self.session_complete {
            return Err(PlaybackError::SessionComplete);
        }
        if self.phase == PlaybackPhase::Completed {
            return Err(PlaybackError::InvalidOperation(
                "round already resolved".into(),
            ));
        }
        if text.trim().is_empty() {
            return Err(PlaybackError::EmptyGuess);
        }

        let title = self.current_track().title.clone();
        let needs_pause = self.cancel_stage();

        if guess_matches(text, &title) {
            Ok(GuessOutcome {
                result: Some(self.resolve_round(true, title)),
                needs_pause,
            })
        } else {
            Ok(GuessOutcome {
                result: self.miss(title),
                needs_pause,
            })
        }
    }

    /// Give up on the current stage. Valid from `Playing` or `Paused`;
    /// advancement rules are identical to a mismatched guess.
    pub fn skip_stage(&mut self) -> Result<GuessOutcome> {
        if self.session_complete {
            return Err(PlaybackError::SessionComplete);
        }
        if !matches!(self.phase, PlaybackPhase::Playing | PlaybackPhase::Paused) {
            return Err(PlaybackError::InvalidOperation(format!(
                "skip_stage is only valid from Playing or Paused, not {:?}",
                self.phase
            )));
        }

        let title = self.current_track().title.clone();
        let needs_pause = self.cancel_stage();
        Ok(GuessOutcome {
            result: self.miss(title),
            needs_pause,
        })
    }

    /// Move to the next track after a resolved round.
    ///
    /// From the last track this completes the session instead of wrapping.
    pub fn advance_track(&mut self) -> Result<()> {
        if self.session_complete {
            return Err(PlaybackError::SessionComplete);
        }
        if self.phase != PlaybackPhase::Completed {
            return Err(PlaybackError::InvalidOperation(
                "advance_track requires a resolved round".into(),
            ));
        }

        self.cancel_stage();
        self.elapsed_fraction = 0.0;

        if self.track_index + 1 < self.tracks.len() {
            self.track_index += 1;
            self.stage_index = 0;
            self.phase = PlaybackPhase::Idle;
            self.pending_events.push(GameEvent::TrackAdvanced {
                track_index: self.track_index,
            });
        } else {
            self.track_index = self.tracks.len();
            self.session_complete = true;
            self.pending_events.push(GameEvent::SessionCompleted);
        }
        Ok(())
    }

    /// Tear the session down. Valid at any time.
    pub fn exit_session(&mut self) {
        self.cancel_stage();
        self.session_complete = true;
    }

    // ===== Timer and completion inputs =====

    /// Stage-expiry timer fired. Returns whether audio needs a pause;
    /// a stale epoch is a no-op.
    pub fn stage_expired(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch || self.phase != PlaybackPhase::Playing {
            debug!(epoch, current = self.epoch, "Ignoring stale stage expiry");
            return false;
        }

        self.elapsed_fraction = 1.0;
        self.phase = PlaybackPhase::Paused;
        self.pending_events.push(GameEvent::StageExpired);
        self.audio_capable
    }

    /// Progress ticker fired. Presentation-facing only; never transitions.
    pub fn record_progress(&mut self, epoch: u64, fraction: f32) {
        if epoch != self.epoch || self.phase != PlaybackPhase::Playing {
            return;
        }
        self.elapsed_fraction = fraction.min(1.0);
    }

    /// An in-flight `play` call resolved. A completion for a superseded
    /// stage must not resurrect that stage's phase or timers.
    pub fn play_resolved(&mut self, epoch: u64, result: Result<()>) {
        if epoch != self.epoch || self.phase != PlaybackPhase::Playing {
            debug!(epoch, current = self.epoch, "Dropping stale play completion");
            return;
        }

        if let Err(e) = result {
            // Best effort: the stage timer keeps running without audio.
            warn!(error = %e, "Play command failed");
            self.pending_events.push(GameEvent::PlaybackIssue {
                message: e.to_string(),
            });
        }
    }

    // ===== Internals =====

    /// Leave the current stage: bump the epoch (cancelling both timers) and
    /// report whether audio was live.
    fn cancel_stage(&mut self) -> bool {
        let was_playing = self.phase == PlaybackPhase::Playing;
        self.epoch += 1;
        self.start_pending = false;
        was_playing && self.audio_capable
    }

    fn resolve_round(&mut self, is_correct: bool, title: String) -> GuessResult {
        self.phase = PlaybackPhase::Completed;
        self.elapsed_fraction = 0.0;
        let result = GuessResult {
            is_correct,
            revealed_title: title,
        };
        self.pending_events.push(GameEvent::RoundResolved {
            result: result.clone(),
        });
        result
    }

    /// Shared mismatch/skip advancement: longer stage if one remains,
    /// otherwise the round resolves as a miss.
    fn miss(&mut self, title: String) -> Option<GuessResult> {
        if self.stage_index + 1 < STAGE_COUNT {
            self.stage_index += 1;
            self.phase = PlaybackPhase::Idle;
            self.elapsed_fraction = 0.0;
            self.pending_events.push(GameEvent::StageAdvanced {
                stage_index: self.stage_index,
            });
            None
        } else {
            Some(self.resolve_round(false, title))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tracks(n: usize) -> Vec<Track> {
        (0..n)
            .map(|i| Track::new(format!("spotify:track:{i}"), format!("Song Number {i}"), 200_000))
            .collect()
    }

    fn ready(controller: &mut GameController) {
        controller.handle_backend_event(BackendEvent::Ready {
            device_id: "device-1".into(),
        });
    }

    #[test]
    fn empty_track_list_is_rejected() {
        assert!(matches!(
            GameController::new(Vec::new()),
            Err(PlaybackError::NoTracks)
        ));
    }

    #[test]
    fn start_stage_before_ready_is_deferred() {
        let mut c = GameController::new(tracks(1)).unwrap();

        let plan = c.start_stage().unwrap();
        assert!(plan.is_none());
        assert_eq!(c.snapshot().phase, PlaybackPhase::Idle);

        // Readiness releases the parked start.
        let plan = c
            .handle_backend_event(BackendEvent::Ready {
                device_id: "device-1".into(),
            })
            .expect("deferred start should fire on Ready");
        assert_eq!(plan.duration, Duration::from_millis(500));
        assert!(plan.track.is_some());
        assert_eq!(c.snapshot().phase, PlaybackPhase::Playing);
    }

    #[test]
    fn start_stage_is_only_valid_from_idle() {
        let mut c = GameController::new(tracks(1)).unwrap();
        ready(&mut c);
        c.start_stage().unwrap();

        assert!(matches!(
            c.start_stage(),
            Err(PlaybackError::InvalidOperation(_))
        ));
    }

    #[test]
    fn expiry_pauses_and_is_the_only_automatic_transition() {
        let mut c = GameController::new(tracks(1)).unwrap();
        ready(&mut c);
        let plan = c.start_stage().unwrap().unwrap();

        assert!(c.stage_expired(plan.epoch));
        let snap = c.snapshot();
        assert_eq!(snap.phase, PlaybackPhase::Paused);
        assert_eq!(snap.elapsed_fraction, 1.0);

        // A second fire of the same timer is stale.
        assert!(!c.stage_expired(plan.epoch));
    }

    #[test]
    fn stale_expiry_from_previous_stage_is_ignored() {
        let mut c = GameController::new(tracks(1)).unwrap();
        ready(&mut c);
        let first = c.start_stage().unwrap().unwrap();

        // Skip cancels the stage; its timer must now be inert.
        c.skip_stage().unwrap();
        let second = c.start_stage().unwrap().unwrap();
        assert_ne!(first.epoch, second.epoch);

        assert!(!c.stage_expired(first.epoch));
        assert_eq!(c.snapshot().phase, PlaybackPhase::Playing);
    }

    #[test]
    fn stale_play_completion_does_not_resurrect_stage() {
        let mut c = GameController::new(tracks(1)).unwrap();
        ready(&mut c);
        let plan = c.start_stage().unwrap().unwrap();

        // Play still in flight when the user skips.
        c.skip_stage().unwrap();
        c.play_resolved(plan.epoch, Ok(()));
        c.play_resolved(
            plan.epoch,
            Err(PlaybackError::PlaybackRejected { status: 502 }),
        );

        assert_eq!(c.snapshot().phase, PlaybackPhase::Idle);
        assert_eq!(c.snapshot().stage_index, 1);
        // The stale failure must not leak a playback issue event.
        assert!(!c
            .drain_events()
            .iter()
            .any(|e| matches!(e, GameEvent::PlaybackIssue { .. })));
    }

    #[test]
    fn correct_guess_resolves_round() {
        let mut c = GameController::new(tracks(2)).unwrap();
        ready(&mut c);
        c.start_stage().unwrap();

        let outcome = c.submit_guess("song number 0").unwrap();
        let result = outcome.result.expect("round should resolve");
        assert!(result.is_correct);
        assert_eq!(result.revealed_title, "Song Number 0");
        assert!(outcome.needs_pause);
        assert_eq!(c.snapshot().phase, PlaybackPhase::Completed);

        c.advance_track().unwrap();
        let snap = c.snapshot();
        assert_eq!(snap.track_index, 1);
        assert_eq!(snap.stage_index, 0);
        assert_eq!(snap.phase, PlaybackPhase::Idle);
        assert_eq!(c.current_track().title, "Song Number 1");
    }

    #[test]
    fn late_guess_after_expiry_still_counts() {
        let mut c = GameController::new(tracks(1)).unwrap();
        ready(&mut c);
        let plan = c.start_stage().unwrap().unwrap();
        c.stage_expired(plan.epoch);

        let outcome = c.submit_guess("Song Number 0").unwrap();
        assert!(outcome.result.unwrap().is_correct);
        // Nothing was playing any more.
        assert!(!outcome.needs_pause);
    }

    #[test]
    fn empty_guess_does_not_consume_a_stage() {
        let mut c = GameController::new(tracks(1)).unwrap();
        ready(&mut c);
        c.start_stage().unwrap();

        assert!(matches!(
            c.submit_guess("   "),
            Err(PlaybackError::EmptyGuess)
        ));
        assert_eq!(c.snapshot().stage_index, 0);
        assert_eq!(c.snapshot().phase, PlaybackPhase::Playing);
    }

    #[test]
    fn six_misses_resolve_the_round() {
        let mut c = GameController::new(tracks(1)).unwrap();
        ready(&mut c);

        for expected_stage in 1..STAGE_COUNT {
            let outcome = c.submit_guess("wrong").unwrap();
            assert!(outcome.result.is_none());
            assert_eq!(c.snapshot().stage_index, expected_stage);
        }

        let outcome = c.submit_guess("wrong").unwrap();
        let result = outcome.result.expect("sixth miss must resolve");
        assert!(!result.is_correct);
        assert_eq!(result.revealed_title, "Song Number 0");
    }

    #[test]
    fn six_skips_resolve_the_round_and_last_track_completes_session() {
        let mut c = GameController::new(tracks(1)).unwrap();
        ready(&mut c);

        let mut resolved = None;
        for _ in 0..STAGE_COUNT {
            c.start_stage().unwrap();
            resolved = c.skip_stage().unwrap().result;
        }
        let result = resolved.expect("sixth skip must resolve");
        assert!(!result.is_correct);
        assert_eq!(result.revealed_title, "Song Number 0");

        c.advance_track().unwrap();
        let snap = c.snapshot();
        assert!(snap.session_complete);
        assert_eq!(snap.track_index, 1);

        assert!(matches!(
            c.advance_track(),
            Err(PlaybackError::SessionComplete)
        ));
    }

    #[test]
    fn skip_requires_an_active_stage() {
        let mut c = GameController::new(tracks(1)).unwrap();
        ready(&mut c);

        assert!(matches!(
            c.skip_stage(),
            Err(PlaybackError::InvalidOperation(_))
        ));
    }

    #[test]
    fn advance_requires_resolved_round() {
        let mut c = GameController::new(tracks(2)).unwrap();
        ready(&mut c);
        c.start_stage().unwrap();

        assert!(matches!(
            c.advance_track(),
            Err(PlaybackError::InvalidOperation(_))
        ));
    }

    #[test]
    fn ineligible_account_runs_timer_only_stages() {
        let mut c = GameController::new(tracks(1)).unwrap();
        c.handle_backend_event(BackendEvent::AccountIneligible {
            message: "premium required".into(),
        });

        let plan = c.start_stage().unwrap().expect("fallback starts at once");
        assert!(plan.track.is_none());
        assert_eq!(c.snapshot().phase, PlaybackPhase::Playing);

        // Expiry must not ask for a pause without audio.
        assert!(!c.stage_expired(plan.epoch));
        assert_eq!(c.snapshot().phase, PlaybackPhase::Paused);

        // Guessing works identically.
        let outcome = c.submit_guess("Song Number 0").unwrap();
        assert!(outcome.result.unwrap().is_correct);
        assert!(!outcome.needs_pause);
    }

    #[test]
    fn ineligible_event_releases_deferred_start() {
        let mut c = GameController::new(tracks(1)).unwrap();
        assert!(c.start_stage().unwrap().is_none());

        let plan = c
            .handle_backend_event(BackendEvent::AccountIneligible {
                message: "premium required".into(),
            })
            .expect("fallback releases the parked start");
        assert!(plan.track.is_none());
    }

    #[test]
    fn auth_expiry_ends_the_session() {
        let mut c = GameController::new(tracks(1)).unwrap();
        ready(&mut c);
        let plan = c.start_stage().unwrap().unwrap();

        c.handle_backend_event(BackendEvent::AuthExpired {
            message: "refresh failed".into(),
        });

        let snap = c.snapshot();
        assert!(snap.session_complete);
        // The mid-clip stage is torn down, not left in Playing.
        assert_eq!(snap.phase, PlaybackPhase::Idle);
        assert_eq!(snap.elapsed_fraction, 0.0);
        assert!(c
            .drain_events()
            .iter()
            .any(|e| matches!(e, GameEvent::ReauthRequired { .. })));
        // The running stage's timer is cancelled.
        assert!(!c.stage_expired(plan.epoch));
    }

    #[test]
    fn playback_error_keeps_stage_running() {
        let mut c = GameController::new(tracks(1)).unwrap();
        ready(&mut c);
        let plan = c.start_stage().unwrap().unwrap();

        c.handle_backend_event(BackendEvent::PlaybackError {
            message: "stream hiccup".into(),
        });

        assert_eq!(c.snapshot().phase, PlaybackPhase::Playing);
        // Same epoch: the original expiry still applies.
        assert!(c.stage_expired(plan.epoch));
    }

    #[test]
    fn progress_is_clamped_and_stage_scoped() {
        let mut c = GameController::new(tracks(1)).unwrap();
        ready(&mut c);
        let plan = c.start_stage().unwrap().unwrap();

        c.record_progress(plan.epoch, 0.4);
        assert_eq!(c.snapshot().elapsed_fraction, 0.4);

        c.record_progress(plan.epoch, 1.7);
        assert_eq!(c.snapshot().elapsed_fraction, 1.0);

        c.skip_stage().unwrap();
        c.record_progress(plan.epoch, 0.9);
        assert_eq!(c.snapshot().elapsed_fraction, 0.0);
    }

    proptest! {
        /// Any interleaving of wrong guesses and skips drives the stage
        /// index monotonically from 0 to 5 and always resolves on the
        /// sixth miss, never beyond.
        #[test]
        fn stage_progression_is_monotonic_and_bounded(use_skip in proptest::collection::vec(any::<bool>(), 6)) {
            let mut c = GameController::new(tracks(1)).unwrap();
            ready(&mut c);

            let mut last_stage = 0;
            for (i, skip) in use_skip.iter().enumerate() {
                if c.snapshot().phase == PlaybackPhase::Idle {
                    c.start_stage().unwrap();
                }
                let outcome = if *skip {
                    c.skip_stage().unwrap()
                } else {
                    c.submit_guess("definitely wrong").unwrap()
                };

                let snap = c.snapshot();
                prop_assert!(snap.stage_index >= last_stage);
                prop_assert!(snap.stage_index < STAGE_COUNT);
                last_stage = snap.stage_index;

                if i < 5 {
                    prop_assert!(outcome.result.is_none());
                } else {
                    prop_assert!(outcome.result.is_some());
                    prop_assert_eq!(snap.phase, PlaybackPhase::Completed);
                }
            }
        }
    }
}
