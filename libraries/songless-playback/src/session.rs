//! Tokio session loop
//!
//! `GameSession::spawn` puts the controller, the backend and all timers
//! behind a single task driven by `tokio::select!`. The presentation layer
//! talks to it through a `SessionHandle`: intents go in over a channel,
//! state comes back as watch-published snapshots plus a stream of
//! `GameEvent`s. Nothing outside the task ever touches the controller or
//! the backend connection, so timer-driven and intent-driven mutation
//! cannot race.
//!
//! Exactly one expiry deadline and one ticker exist at a time: both belong
//! to the `ActiveStage` record, which is dropped on every transition out of
//! the stage. In-flight `play` calls run as detached sub-tasks that report
//! back with the stage epoch, so a newer intent is never blocked behind a
//! slow network call and a completion for a superseded stage is dropped by
//! the controller's epoch check.

use crate::backend::PlaybackBackend;
use crate::controller::{GameController, StagePlan};
use crate::error::{PlaybackError, Result};
use crate::events::{BackendEvent, GameEvent};
use crate::state::{PlaybackPhase, SessionSnapshot};
use songless_core::Track;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Progress ticker period while a clip is playing
const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// User intents accepted by the session loop
#[derive(Debug)]
enum SessionIntent {
    StartStage,
    SubmitGuess(String),
    SkipStage,
    AdvanceTrack,
    Exit,
}

/// Result of a spawned `play` call, tagged with its stage epoch
struct PlayCompletion {
    epoch: u64,
    result: Result<()>,
}

/// Timers owned by the currently playing stage
struct ActiveStage {
    epoch: u64,
    started_at: Instant,
    deadline: Instant,
    duration: Duration,
}

/// Handle to a running game session
///
/// Dropping the handle (or calling [`SessionHandle::exit`]) tears the
/// session down and disconnects the backend.
pub struct SessionHandle {
    intents: mpsc::UnboundedSender<SessionIntent>,
    snapshots: watch::Receiver<SessionSnapshot>,
    events: mpsc::UnboundedReceiver<GameEvent>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Request the current stage's clip to start.
    pub fn start_stage(&self) -> Result<()> {
        self.send(SessionIntent::StartStage)
    }

    /// Submit a guess for the current track.
    ///
    /// Whitespace-only input is rejected here, before it can cost a stage.
    /// The outcome arrives as a `RoundResolved` or `StageAdvanced` event;
    /// after `StageAdvanced` the caller decides when to start the longer
    /// clip with [`SessionHandle::start_stage`].
    pub fn submit_guess(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(PlaybackError::EmptyGuess);
        }
        self.send(SessionIntent::SubmitGuess(text))
    }

    /// Give up on the current stage.
    pub fn skip_stage(&self) -> Result<()> {
        self.send(SessionIntent::SkipStage)
    }

    /// Move on after a resolved round.
    pub fn advance_track(&self) -> Result<()> {
        self.send(SessionIntent::AdvanceTrack)
    }

    /// End the session and disconnect the backend.
    pub fn exit(&self) -> Result<()> {
        self.send(SessionIntent::Exit)
    }

    /// Latest published state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Wait for the next state publication.
    pub async fn changed(&mut self) -> Result<SessionSnapshot> {
        self.snapshots
            .changed()
            .await
            .map_err(|_| PlaybackError::SessionClosed)?;
        Ok(self.snapshot())
    }

    /// Receive the next presentation event; `None` once the session ended.
    pub async fn next_event(&mut self) -> Option<GameEvent> {
        self.events.recv().await
    }

    /// Request teardown and wait for the loop to finish.
    pub async fn shutdown(self) {
        let _ = self.intents.send(SessionIntent::Exit);
        let _ = self.task.await;
    }

    fn send(&self, intent: SessionIntent) -> Result<()> {
        self.intents
            .send(intent)
            .map_err(|_| PlaybackError::SessionClosed)
    }
}

/// Factory for running sessions
pub struct GameSession;

impl GameSession {
    /// Spawn a session over `tracks`, driving `backend` and absorbing its
    /// lifecycle events from `backend_events`.
    pub fn spawn<B: PlaybackBackend>(
        tracks: Vec<Track>,
        backend: B,
        backend_events: mpsc::UnboundedReceiver<BackendEvent>,
    ) -> Result<SessionHandle> {
        let controller = GameController::new(tracks)?;
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());

        let task = tokio::spawn(run_loop(
            controller,
            Arc::new(backend),
            backend_events,
            intent_rx,
            event_tx,
            snapshot_tx,
        ));

        Ok(SessionHandle {
            intents: intent_tx,
            snapshots: snapshot_rx,
            events: event_rx,
            task,
        })
    }
}

async fn run_loop<B: PlaybackBackend>(
    mut controller: GameController,
    backend: Arc<B>,
    mut backend_events: mpsc::UnboundedReceiver<BackendEvent>,
    mut intents: mpsc::UnboundedReceiver<SessionIntent>,
    events: mpsc::UnboundedSender<GameEvent>,
    snapshots: watch::Sender<SessionSnapshot>,
) {
    let (completion_tx, mut completions) = mpsc::unbounded_channel::<PlayCompletion>();
    let mut stage: Option<ActiveStage> = None;
    let mut backend_open = true;

    let mut ticker = interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        // A dummy far-off deadline keeps the expiry future constructible
        // while no stage is armed; the branch guard stops it being polled.
        let deadline = stage
            .as_ref()
            .map_or_else(|| Instant::now() + Duration::from_secs(3600), |s| s.deadline);

        tokio::select! {
            maybe_intent = intents.recv() => {
                let Some(intent) = maybe_intent else {
                    // Handle dropped: same teardown as an explicit exit.
                    teardown(&mut controller, &backend).await;
                    publish(&mut controller, &events, &snapshots);
                    break;
                };
                if matches!(intent, SessionIntent::Exit) {
                    teardown(&mut controller, &backend).await;
                    publish(&mut controller, &events, &snapshots);
                    break;
                }
                handle_intent(
                    intent,
                    &mut controller,
                    &backend,
                    &completion_tx,
                    &mut stage,
                    &mut ticker,
                    &events,
                )
                .await;
            }

            maybe_event = backend_events.recv(), if backend_open => {
                match maybe_event {
                    Some(event) => {
                        if let Some(plan) = controller.handle_backend_event(event) {
                            launch_stage(plan, &backend, &completion_tx, &mut stage, &mut ticker);
                        }
                    }
                    None => backend_open = false,
                }
            }

            Some(done) = completions.recv() => {
                controller.play_resolved(done.epoch, done.result);
            }

            () = sleep_until(deadline), if stage.is_some() => {
                if let Some(expired) = stage.take() {
                    if controller.stage_expired(expired.epoch) {
                        pause_best_effort(&backend, &events).await;
                    }
                }
            }

            _ = ticker.tick(), if stage.is_some() => {
                if let Some(s) = &stage {
                    let elapsed = Instant::now().saturating_duration_since(s.started_at);
                    let fraction = elapsed.as_secs_f32() / s.duration.as_secs_f32();
                    controller.record_progress(s.epoch, fraction);
                }
            }
        }

        // Timers are scoped to the stage that created them; drop them the
        // moment the controller has moved on.
        if let Some(s) = &stage {
            if s.epoch != controller.epoch()
                || controller.snapshot().phase != PlaybackPhase::Playing
            {
                stage = None;
            }
        }

        publish(&mut controller, &events, &snapshots);
    }
}

async fn handle_intent<B: PlaybackBackend>(
    intent: SessionIntent,
    controller: &mut GameController,
    backend: &Arc<B>,
    completion_tx: &mpsc::UnboundedSender<PlayCompletion>,
    stage: &mut Option<ActiveStage>,
    ticker: &mut tokio::time::Interval,
    events: &mpsc::UnboundedSender<GameEvent>,
) {
    match intent {
        SessionIntent::StartStage => match controller.start_stage() {
            Ok(Some(plan)) => launch_stage(plan, backend, completion_tx, stage, ticker),
            Ok(None) => debug!("Stage start parked until backend readiness"),
            Err(e) => debug!(error = %e, "Rejected start_stage intent"),
        },
        SessionIntent::SubmitGuess(text) => match controller.submit_guess(&text) {
            Ok(outcome) => {
                if outcome.needs_pause {
                    pause_best_effort(backend, events).await;
                }
            }
            Err(e) => debug!(error = %e, "Rejected guess"),
        },
        SessionIntent::SkipStage => match controller.skip_stage() {
            Ok(outcome) => {
                if outcome.needs_pause {
                    pause_best_effort(backend, events).await;
                }
            }
            Err(e) => debug!(error = %e, "Rejected skip_stage intent"),
        },
        SessionIntent::AdvanceTrack => match controller.advance_track() {
            Ok(()) => {
                // Residual audio from the resolved round is stopped here.
                if controller.snapshot().audio_capable {
                    pause_best_effort(backend, events).await;
                }
            }
            Err(e) => debug!(error = %e, "Rejected advance_track intent"),
        },
        SessionIntent::Exit => unreachable!("Exit is handled by the loop"),
    }
}

/// Arm the stage timers and, unless in timer-only fallback, fire off the
/// play call as a detached task reporting back with the stage epoch.
fn launch_stage<B: PlaybackBackend>(
    plan: StagePlan,
    backend: &Arc<B>,
    completion_tx: &mpsc::UnboundedSender<PlayCompletion>,
    stage: &mut Option<ActiveStage>,
    ticker: &mut tokio::time::Interval,
) {
    let now = Instant::now();
    *stage = Some(ActiveStage {
        epoch: plan.epoch,
        started_at: now,
        deadline: now + plan.duration,
        duration: plan.duration,
    });
    ticker.reset();

    if let Some(track) = plan.track {
        let backend = Arc::clone(backend);
        let completion_tx = completion_tx.clone();
        let epoch = plan.epoch;
        tokio::spawn(async move {
            let result = backend.play(&track, 0).await;
            let _ = completion_tx.send(PlayCompletion { epoch, result });
        });
    }
}

async fn pause_best_effort<B: PlaybackBackend>(
    backend: &Arc<B>,
    events: &mpsc::UnboundedSender<GameEvent>,
) {
    if let Err(e) = backend.pause().await {
        warn!(error = %e, "Pause command failed");
        let _ = events.send(GameEvent::PlaybackIssue {
            message: e.to_string(),
        });
    }
}

async fn teardown<B: PlaybackBackend>(controller: &mut GameController, backend: &Arc<B>) {
    controller.exit_session();
    if controller.snapshot().audio_capable {
        if let Err(e) = backend.pause().await {
            debug!(error = %e, "Pause during teardown failed");
        }
    }
    backend.disconnect().await;
}

fn publish(
    controller: &mut GameController,
    events: &mpsc::UnboundedSender<GameEvent>,
    snapshots: &watch::Sender<SessionSnapshot>,
) {
    for event in controller.drain_events() {
        let _ = events.send(event);
    }
    snapshots.send_replace(controller.snapshot());
}
