//! Session lifecycle: Idle -> Starting -> Active -> Stopping -> Idle.
//!
//! At most one session is live at a time. Starting a new one forcibly tears
//! down whatever the previous session still holds (draw task, encoders,
//! source handle) before acquiring anything, so two sessions never hold a
//! live source simultaneously. Stop is idempotent.

use crate::compositor::Compositor;
use crate::encoder::{screenshot_filename, EncoderInstance, FRAME_INTERVAL_MS};
use crate::error::EngineError;
use crate::geometry::Layout;
use crate::source::{SourceFrame, SourceHandle, StopHandle};
use bezelrec_types::{Artifact, CaptureConfig, CaptureMode, OutputFormat, SessionEvent, SessionPhase};
use chrono::{Local, Utc};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{error, info, warn};

/// Settle delay before composing a screenshot frame; lets the first frame
/// of a freshly negotiated stream stabilize.
const SCREENSHOT_SETTLE_MS: u64 = 500;
/// How long the Starting phase waits for the first readable frame.
const FIRST_FRAME_TIMEOUT_MS: u64 = 5000;

/// Result of one finished (or failed) session.
#[derive(Debug, Default)]
pub struct SessionOutcome {
    /// Finalized artifacts, one per successful output (or one PNG)
    pub artifacts: Vec<Artifact>,
    /// Per-output and session-level errors; partial success is allowed
    pub errors: Vec<EngineError>,
    /// Whether a session-fatal error forced the stop
    pub errored: bool,
}

struct Shared {
    phase: RwLock<SessionPhase>,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl Shared {
    async fn set_phase(&self, phase: SessionPhase) {
        *self.phase.write().await = phase;
        self.emit(SessionEvent::Phase { phase });
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn status(&self, message: &str) {
        self.emit(SessionEvent::Status {
            message: message.to_string(),
        });
    }
}

struct ActiveSession {
    id: u64,
    /// Stops the draw/feed loop
    stop_flag: Arc<AtomicBool>,
    /// Stops the external frame producer
    source_stop: Option<StopHandle>,
    task: tokio::task::JoinHandle<SessionOutcome>,
}

/// Orchestrates one capture session across compositor and encoders.
pub struct SessionController {
    shared: Arc<Shared>,
    session: Mutex<Option<ActiveSession>>,
    /// Guards the Starting transition; only one acquisition in flight
    starting: tokio::sync::Mutex<()>,
    next_id: AtomicU64,
}

impl SessionController {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Controller that reports lifecycle events to `events`.
    pub fn with_events(events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self::build(Some(events))
    }

    fn build(events: Option<mpsc::UnboundedSender<SessionEvent>>) -> Self {
        Self {
            shared: Arc::new(Shared {
                phase: RwLock::new(SessionPhase::Idle),
                events,
            }),
            session: Mutex::new(None),
            starting: tokio::sync::Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn phase(&self) -> SessionPhase {
        *self.shared.phase.read().await
    }

    /// Start a new session, superseding any live one.
    ///
    /// Returns once the session task is running; artifacts are collected by
    /// [`SessionController::stop`] (recordings) or emitted when the session
    /// completes on its own (screenshots).
    pub async fn start(
        &self,
        config: CaptureConfig,
        source: SourceHandle,
    ) -> Result<(), EngineError> {
        let _guard = self
            .starting
            .try_lock()
            .map_err(|_| EngineError::StartInProgress)?;

        // Defensive reset: a prior session may not have fully torn down.
        let prior = self.teardown().await;
        if !prior.artifacts.is_empty() {
            warn!(
                "superseded session discarded {} finished artifact(s)",
                prior.artifacts.len()
            );
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared.set_phase(SessionPhase::Starting).await;
        self.shared.status(match config.mode {
            CaptureMode::Screenshot => "Taking screenshot...",
            CaptureMode::Recording => "Starting recording...",
        });
        info!(session = id, mode = ?config.mode, "starting session");

        let layout = Layout::compute(
            config.logical_width,
            config.logical_height,
            config.dpr(),
            config.show_frame,
        );
        let compositor = Compositor::new(layout, config.show_notch, config.background, config.mode)?;

        let stop_flag = Arc::new(AtomicBool::new(false));
        let (receiver, still, source_stop) = match source {
            SourceHandle::Stream(rx, stop) => (Some(rx), None, Some(stop)),
            SourceHandle::Still(frame) => (None, Some(frame), None),
        };

        let shared = self.shared.clone();
        let task_stop = stop_flag.clone();
        let task = tokio::spawn(run_session(
            id, config, compositor, receiver, still, task_stop, shared,
        ));

        *self.session.lock().await = Some(ActiveSession {
            id,
            stop_flag,
            source_stop,
            task,
        });
        Ok(())
    }

    /// Stop the live session and collect its outcome. Idempotent: with no
    /// session active this is a no-op returning an empty outcome.
    pub async fn stop(&self) -> SessionOutcome {
        self.teardown().await
    }

    async fn teardown(&self) -> SessionOutcome {
        let Some(active) = self.session.lock().await.take() else {
            return SessionOutcome::default();
        };

        // Frame production stops before encoder finalization.
        active.stop_flag.store(true, Ordering::Relaxed);
        if let Some(source_stop) = &active.source_stop {
            source_stop.store(true, Ordering::Relaxed);
        }

        let outcome = match active.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(session = active.id, "session task panicked: {}", e);
                SessionOutcome {
                    artifacts: Vec::new(),
                    errors: vec![EngineError::CompositingFault(e.to_string())],
                    errored: true,
                }
            }
        };

        self.shared.set_phase(SessionPhase::Idle).await;
        self.shared.status("Idle");
        info!(
            session = active.id,
            artifacts = outcome.artifacts.len(),
            errors = outcome.errors.len(),
            "session torn down"
        );
        outcome
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

fn clock_text() -> String {
    Local::now().format("%H:%M").to_string()
}

/// Requested outputs with duplicates removed, order preserved. One encoder
/// per distinct format regardless of how the caller filled the list.
fn unique_outputs(outputs: &[OutputFormat]) -> Vec<OutputFormat> {
    let mut unique = Vec::with_capacity(outputs.len());
    for format in outputs {
        if !unique.contains(format) {
            unique.push(*format);
        }
    }
    unique
}

/// The per-session task: waits for the source, runs the draw cadence, feeds
/// encoders, finalizes on stop. All phase transitions past Starting happen
/// here.
async fn run_session(
    id: u64,
    config: CaptureConfig,
    mut compositor: Compositor,
    mut receiver: Option<crate::source::FrameReceiver>,
    still: Option<SourceFrame>,
    stop_flag: Arc<AtomicBool>,
    shared: Arc<Shared>,
) -> SessionOutcome {
    let mut outcome = SessionOutcome::default();

    if config.mode == CaptureMode::Screenshot {
        // Fixed settle delay so the first frame stabilizes.
        tokio::time::sleep(std::time::Duration::from_millis(SCREENSHOT_SETTLE_MS)).await;
        let frame = match acquire_first_frame(&mut receiver, &still).await {
            Ok(frame) => frame,
            Err(e) => {
                report_fatal(&shared, &mut outcome, e);
                shared.set_phase(SessionPhase::Idle).await;
                return outcome;
            }
        };

        shared.set_phase(SessionPhase::Active).await;
        let drew = std::panic::catch_unwind(AssertUnwindSafe(|| {
            compositor.draw(&frame, &clock_text())
        }));
        match drew {
            Ok(true) => match compositor.surface_png() {
                Ok(data) => {
                    let artifact = Artifact {
                        format: None,
                        filename: screenshot_filename(Utc::now()),
                        data,
                    };
                    shared.status("Processing download...");
                    shared.emit(SessionEvent::ArtifactReady {
                        filename: artifact.filename.clone(),
                        bytes: artifact.data.len(),
                    });
                    shared.status("Screenshot taken");
                    outcome.artifacts.push(artifact);
                }
                Err(e) => report_fatal(&shared, &mut outcome, e),
            },
            Ok(false) => report_fatal(
                &shared,
                &mut outcome,
                EngineError::SourceAcquisitionFailed("still frame has no readable pixels".into()),
            ),
            Err(_) => report_fatal(
                &shared,
                &mut outcome,
                EngineError::CompositingFault("draw tick panicked".into()),
            ),
        }

        shared.set_phase(SessionPhase::Idle).await;
        return outcome;
    }

    // Recording: start one independent encoder per requested output.
    // An unsupported codec for one output never blocks the others.
    let layout = *compositor.layout();
    let outputs = unique_outputs(&config.outputs);
    let mut encoders: Vec<EncoderInstance> = Vec::new();
    for format in &outputs {
        match EncoderInstance::start(*format, layout.canvas_width, layout.canvas_height) {
            Ok(encoder) => encoders.push(encoder),
            Err(e) => {
                warn!(session = id, "encoder unavailable: {}", e);
                shared.emit(SessionEvent::Error {
                    message: e.to_string(),
                });
                outcome.errors.push(e);
            }
        }
    }
    let requested = outputs.len();

    // Starting -> Active once the source yields a readable frame.
    let mut last_frame = match acquire_first_frame(&mut receiver, &still).await {
        Ok(frame) => frame,
        Err(e) => {
            report_fatal(&shared, &mut outcome, e);
            drop(encoders);
            shared.set_phase(SessionPhase::Idle).await;
            return outcome;
        }
    };

    shared.set_phase(SessionPhase::Active).await;
    shared.status("Recording...");
    info!(session = id, encoders = encoders.len(), "recording");

    let mut ticker =
        tokio::time::interval(std::time::Duration::from_millis(FRAME_INTERVAL_MS));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    while !stop_flag.load(Ordering::Relaxed) {
        ticker.tick().await;
        if stop_flag.load(Ordering::Relaxed) {
            break;
        }
        // All requested encoders are gone; nothing left to feed.
        if requested > 0 && encoders.is_empty() {
            outcome.errored = true;
            break;
        }

        // Drain to the freshest frame; reuse the previous one if the source
        // has nothing new this tick.
        if let Some(rx) = receiver.as_mut() {
            loop {
                match rx.try_recv() {
                    Ok(frame) => last_frame = frame,
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => break,
                }
            }
        }

        let drew = std::panic::catch_unwind(AssertUnwindSafe(|| {
            compositor.draw(&last_frame, &clock_text())
        }));
        let drew = match drew {
            Ok(drew) => drew,
            Err(_) => {
                report_fatal(
                    &shared,
                    &mut outcome,
                    EngineError::CompositingFault("draw tick panicked".into()),
                );
                break;
            }
        };
        if !drew {
            continue;
        }

        if encoders.is_empty() {
            continue;
        }
        let rgba = compositor.surface_rgba();
        let mut failed = Vec::new();
        for (idx, encoder) in encoders.iter_mut().enumerate() {
            if let Err(e) = encoder.write_frame(&rgba, layout.canvas_width, layout.canvas_height) {
                warn!(session = id, "encoder dropped: {}", e);
                shared.emit(SessionEvent::Error {
                    message: e.to_string(),
                });
                outcome.errors.push(e);
                failed.push(idx);
            }
        }
        for idx in failed.into_iter().rev() {
            drop(encoders.remove(idx));
        }
    }

    shared.set_phase(SessionPhase::Stopping).await;
    if !encoders.is_empty() {
        shared.status("Processing download...");
    }
    let finished_at = Utc::now();
    for encoder in encoders {
        let format = encoder.format();
        match encoder.finish(finished_at) {
            Ok(artifact) => {
                shared.emit(SessionEvent::ArtifactReady {
                    filename: artifact.filename.clone(),
                    bytes: artifact.data.len(),
                });
                outcome.artifacts.push(artifact);
            }
            Err(e) => {
                warn!(session = id, "finalize failed for {:?}: {}", format, e);
                shared.emit(SessionEvent::Error {
                    message: e.to_string(),
                });
                outcome.errors.push(e);
            }
        }
    }

    // Every encoder has reported; the session is over whether the loop ended
    // on stop() or on its own. Teardown re-sets Idle, which is harmless.
    shared.set_phase(SessionPhase::Idle).await;
    outcome
}

/// Wait for the first readable frame from the source.
async fn acquire_first_frame(
    receiver: &mut Option<crate::source::FrameReceiver>,
    still: &Option<SourceFrame>,
) -> Result<SourceFrame, EngineError> {
    if let Some(frame) = still {
        return if frame.is_readable() {
            Ok(frame.clone())
        } else {
            Err(EngineError::SourceAcquisitionFailed(
                "still frame has no readable pixels".into(),
            ))
        };
    }

    let Some(rx) = receiver.as_mut() else {
        return Err(EngineError::SourceAcquisitionFailed(
            "no source handle".into(),
        ));
    };

    let deadline = std::time::Duration::from_millis(FIRST_FRAME_TIMEOUT_MS);
    match tokio::time::timeout(deadline, rx.recv()).await {
        Ok(Some(frame)) if frame.is_readable() => Ok(frame),
        Ok(Some(_)) => Err(EngineError::SourceAcquisitionFailed(
            "first frame has no readable pixels".into(),
        )),
        Ok(None) => Err(EngineError::SourceAcquisitionFailed(
            "source closed before producing a frame".into(),
        )),
        Err(_) => Err(EngineError::SourceAcquisitionFailed(
            "timed out waiting for the first frame".into(),
        )),
    }
}

fn report_fatal(shared: &Shared, outcome: &mut SessionOutcome, error: EngineError) {
    error!("session-fatal: {}", error);
    shared.emit(SessionEvent::Error {
        message: error.to_string(),
    });
    outcome.errors.push(error);
    outcome.errored = true;
}
