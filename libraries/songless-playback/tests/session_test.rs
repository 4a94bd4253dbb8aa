//! Session loop integration tests
//!
//! Runs real sessions against a mock backend under paused tokio time, so
//! stage timers fire deterministically and in-flight play calls can be
//! made arbitrarily slow.

use songless_core::Track;
use songless_playback::{
    BackendEvent, GameEvent, GameSession, PlaybackBackend, PlaybackError, PlaybackPhase,
    SessionHandle,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

// ===== Test helpers =====

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Play { uri: String, position_ms: u64 },
    Pause,
    Disconnect,
}

/// Mock backend recording every command; `play` can be slowed down to keep
/// a call in flight across user intents.
#[derive(Clone)]
struct MockBackend {
    calls: Arc<Mutex<Vec<Call>>>,
    play_delay: Duration,
    fail_play: bool,
}

impl MockBackend {
    fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            play_delay: Duration::ZERO,
            fail_play: false,
        }
    }

    fn with_play_delay(mut self, delay: Duration) -> Self {
        self.play_delay = delay;
        self
    }

    fn with_failing_play(mut self) -> Self {
        self.fail_play = true;
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn play_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Play { .. }))
            .count()
    }

    fn pause_count(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Pause).count()
    }
}

#[async_trait::async_trait]
impl PlaybackBackend for MockBackend {
    async fn play(&self, track: &Track, position_ms: u64) -> songless_playback::Result<()> {
        if !self.play_delay.is_zero() {
            tokio::time::sleep(self.play_delay).await;
        }
        self.calls.lock().unwrap().push(Call::Play {
            uri: track.uri.clone(),
            position_ms,
        });
        if self.fail_play {
            return Err(PlaybackError::PlaybackRejected { status: 502 });
        }
        Ok(())
    }

    async fn pause(&self) -> songless_playback::Result<()> {
        self.calls.lock().unwrap().push(Call::Pause);
        Ok(())
    }

    async fn disconnect(&self) {
        self.calls.lock().unwrap().push(Call::Disconnect);
    }
}

fn tracks(titles: &[&str]) -> Vec<Track> {
    titles
        .iter()
        .enumerate()
        .map(|(i, title)| Track::new(format!("spotify:track:{i}"), *title, 210_000))
        .collect()
}

struct Harness {
    handle: SessionHandle,
    backend: MockBackend,
    backend_tx: mpsc::UnboundedSender<BackendEvent>,
}

fn spawn_session(titles: &[&str], backend: MockBackend) -> Harness {
    let (backend_tx, backend_rx) = mpsc::unbounded_channel();
    let handle = GameSession::spawn(tracks(titles), backend.clone(), backend_rx)
        .expect("session should spawn");
    Harness {
        handle,
        backend,
        backend_tx,
    }
}

fn make_ready(h: &Harness) {
    h.backend_tx
        .send(BackendEvent::Ready {
            device_id: "device-1".into(),
        })
        .unwrap();
}

async fn expect_event(handle: &mut SessionHandle) -> GameEvent {
    timeout(Duration::from_secs(60), handle.next_event())
        .await
        .expect("event should arrive")
        .expect("session should still be alive")
}

async fn expect_no_event(handle: &mut SessionHandle) {
    assert!(
        timeout(Duration::from_millis(200), handle.next_event())
            .await
            .is_err(),
        "no event should be pending"
    );
}

// ===== Scenarios =====

#[tokio::test(start_paused = true)]
async fn correct_guess_then_advance_moves_to_next_track() {
    let mut h = spawn_session(&["Bohemian Rhapsody", "Yesterday"], MockBackend::new());
    make_ready(&h);

    h.handle.start_stage().unwrap();
    assert!(matches!(
        expect_event(&mut h.handle).await,
        GameEvent::StageStarted {
            track_index: 0,
            stage_index: 0,
            duration_ms: 500
        }
    ));

    h.handle.submit_guess("Bohemian Rhapsody").unwrap();
    match expect_event(&mut h.handle).await {
        GameEvent::RoundResolved { result } => {
            assert!(result.is_correct);
            assert_eq!(result.revealed_title, "Bohemian Rhapsody");
        }
        other => panic!("expected RoundResolved, got {other:?}"),
    }
    assert!(h.handle.snapshot().round_resolved());

    h.handle.advance_track().unwrap();
    assert!(matches!(
        expect_event(&mut h.handle).await,
        GameEvent::TrackAdvanced { track_index: 1 }
    ));

    let snap = h.handle.snapshot();
    assert!(!snap.round_resolved());
    assert_eq!(snap.track_index, 1);
    assert_eq!(snap.stage_index, 0);
    assert_eq!(snap.phase, PlaybackPhase::Idle);
    assert!(!snap.session_complete);

    // The guess interrupted live audio; advance also force-pauses.
    assert!(h.backend.pause_count() >= 1);
}

#[tokio::test(start_paused = true)]
async fn six_skips_resolve_round_and_complete_single_track_session() {
    let mut h = spawn_session(&["Hotel California"], MockBackend::new());
    make_ready(&h);

    for stage in 0..6 {
        h.handle.start_stage().unwrap();
        assert!(matches!(
            expect_event(&mut h.handle).await,
            GameEvent::StageStarted { stage_index, .. } if stage_index == stage
        ));

        h.handle.skip_stage().unwrap();
        if stage < 5 {
            assert!(matches!(
                expect_event(&mut h.handle).await,
                GameEvent::StageAdvanced { stage_index } if stage_index == stage + 1
            ));
        }
    }

    match expect_event(&mut h.handle).await {
        GameEvent::RoundResolved { result } => {
            assert!(!result.is_correct);
            assert_eq!(result.revealed_title, "Hotel California");
        }
        other => panic!("expected RoundResolved, got {other:?}"),
    }

    h.handle.advance_track().unwrap();
    assert!(matches!(
        expect_event(&mut h.handle).await,
        GameEvent::SessionCompleted
    ));
    assert!(h.handle.snapshot().session_complete);

    // One play per stage, one pause per mid-clip skip.
    assert_eq!(h.backend.play_count(), 6);
    assert!(h.backend.pause_count() >= 6);
}

#[tokio::test(start_paused = true)]
async fn stage_expiry_pauses_audio_and_fills_progress() {
    let mut h = spawn_session(&["Yesterday"], MockBackend::new());
    make_ready(&h);

    h.handle.start_stage().unwrap();
    assert!(matches!(
        expect_event(&mut h.handle).await,
        GameEvent::StageStarted { .. }
    ));

    // Paused time auto-advances through the 500ms stage window.
    assert!(matches!(
        expect_event(&mut h.handle).await,
        GameEvent::StageExpired
    ));

    let snap = h.handle.snapshot();
    assert_eq!(snap.phase, PlaybackPhase::Paused);
    assert_eq!(snap.elapsed_fraction, 1.0);
    assert_eq!(h.backend.pause_count(), 1);

    // A late guess against the fully played clip is still valid.
    h.handle.submit_guess("yesterday").unwrap();
    assert!(matches!(
        expect_event(&mut h.handle).await,
        GameEvent::RoundResolved { result } if result.is_correct
    ));
}

#[tokio::test(start_paused = true)]
async fn start_before_readiness_is_deferred_until_ready() {
    let mut h = spawn_session(&["Yesterday"], MockBackend::new());

    h.handle.start_stage().unwrap();
    expect_no_event(&mut h.handle).await;
    assert_eq!(h.handle.snapshot().phase, PlaybackPhase::Idle);

    make_ready(&h);
    assert!(matches!(
        expect_event(&mut h.handle).await,
        GameEvent::StageStarted { .. }
    ));
    assert_eq!(h.handle.snapshot().phase, PlaybackPhase::Playing);
}

#[tokio::test(start_paused = true)]
async fn ineligible_account_plays_timer_only_stages() {
    let mut h = spawn_session(&["Yesterday"], MockBackend::new());
    h.backend_tx
        .send(BackendEvent::AccountIneligible {
            message: "premium required".into(),
        })
        .unwrap();
    assert!(matches!(
        expect_event(&mut h.handle).await,
        GameEvent::AudioUnavailable { .. }
    ));

    h.handle.start_stage().unwrap();
    assert!(matches!(
        expect_event(&mut h.handle).await,
        GameEvent::StageStarted { .. }
    ));

    // Timer and expiry still run with zero backend calls.
    assert!(matches!(
        expect_event(&mut h.handle).await,
        GameEvent::StageExpired
    ));
    assert_eq!(h.backend.play_count(), 0);
    assert_eq!(h.backend.pause_count(), 0);

    // Guessing functions identically.
    h.handle.submit_guess("Yesterday").unwrap();
    assert!(matches!(
        expect_event(&mut h.handle).await,
        GameEvent::RoundResolved { result } if result.is_correct
    ));
}

#[tokio::test(start_paused = true)]
async fn skip_while_play_in_flight_drops_stale_completion() {
    let backend = MockBackend::new()
        .with_play_delay(Duration::from_secs(10))
        .with_failing_play();
    let mut h = spawn_session(&["Yesterday"], backend);
    make_ready(&h);

    h.handle.start_stage().unwrap();
    assert!(matches!(
        expect_event(&mut h.handle).await,
        GameEvent::StageStarted { .. }
    ));

    // Skip before the play call resolves.
    h.handle.skip_stage().unwrap();
    assert!(matches!(
        expect_event(&mut h.handle).await,
        GameEvent::StageAdvanced { stage_index: 1 }
    ));

    // Let the slow play call finish; its failure belongs to a superseded
    // stage and must neither resurrect it nor surface an issue.
    tokio::time::sleep(Duration::from_secs(11)).await;
    expect_no_event(&mut h.handle).await;
    let snap = h.handle.snapshot();
    assert_eq!(snap.phase, PlaybackPhase::Idle);
    assert_eq!(snap.stage_index, 1);
}

#[tokio::test(start_paused = true)]
async fn failed_play_on_current_stage_is_reported_but_stage_continues() {
    let backend = MockBackend::new().with_failing_play();
    let mut h = spawn_session(&["Yesterday"], backend);
    make_ready(&h);

    h.handle.start_stage().unwrap();
    assert!(matches!(
        expect_event(&mut h.handle).await,
        GameEvent::StageStarted { .. }
    ));

    // Best-effort continuation: the issue is surfaced, then the expiry
    // timer still resolves the stage.
    assert!(matches!(
        expect_event(&mut h.handle).await,
        GameEvent::PlaybackIssue { .. }
    ));
    assert!(matches!(
        expect_event(&mut h.handle).await,
        GameEvent::StageExpired
    ));
}

#[tokio::test(start_paused = true)]
async fn auth_expiry_mid_clip_ends_session_without_stuck_playing_phase() {
    let mut h = spawn_session(&["Yesterday"], MockBackend::new());
    make_ready(&h);

    h.handle.start_stage().unwrap();
    assert!(matches!(
        expect_event(&mut h.handle).await,
        GameEvent::StageStarted { .. }
    ));

    h.backend_tx
        .send(BackendEvent::AuthExpired {
            message: "refresh failed".into(),
        })
        .unwrap();

    assert!(matches!(
        expect_event(&mut h.handle).await,
        GameEvent::ReauthRequired { .. }
    ));
    let snap = h.handle.snapshot();
    assert!(snap.session_complete);
    // The clip that was mid-stage must not be rendered as still playing.
    assert_ne!(snap.phase, PlaybackPhase::Playing);

    // And the dead stage's timer never fires a late expiry.
    expect_no_event(&mut h.handle).await;
}

#[tokio::test(start_paused = true)]
async fn exit_disconnects_backend() {
    let h = spawn_session(&["Yesterday"], MockBackend::new());
    make_ready(&h);

    let backend = h.backend.clone();
    h.handle.shutdown().await;

    assert!(backend.calls().contains(&Call::Disconnect));
}

#[tokio::test(start_paused = true)]
async fn empty_guess_is_rejected_at_the_handle() {
    let h = spawn_session(&["Yesterday"], MockBackend::new());
    assert!(matches!(
        h.handle.submit_guess("   "),
        Err(PlaybackError::EmptyGuess)
    ));
}
