//! Session phase controller: calibration, stimulus and completion, with
//! every exit path releasing the camera and fullscreen state.

pub mod runner;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use uuid::Uuid;

use crate::calibration::{resolve_layout, CalibrationError, CalibrationOrchestrator, CalibrationSampler, SamplerConfig};
use crate::capture::{CameraDevice, CameraError, CaptureConstraints};
use crate::codec::FrameCodec;
use crate::config::SessionConfig;
use crate::overlay::OverlayPublisher;
use crate::presentation::Presentation;
use crate::resources::SessionResources;
use crate::services::gaze_backend::{
    CalibrationFitter, FrameQualityOracle, GazeBackend, GazePredictor, LayoutProvider,
};
use crate::stimulus::{PlaybackError, StimulusPlayer};
use crate::tracking::{SessionClock, TrackingLoop, TrackingSummary};
use crate::types::{CalibrationTarget, GazeDataPoint, SessionFault, SessionPhase};

pub const AUTOPLAY_HINT: &str = "Tap/click once if the video does not start automatically.";

/// Host callbacks. `on_gaze_data` and `on_complete` fire once per
/// completed session, after resources are released.
pub trait SessionObserver: Send + Sync {
    fn on_gaze_data(&self, points: &[GazeDataPoint]);
    fn on_complete(&self);
    fn on_phase(&self, _phase: SessionPhase) {}
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("camera unavailable: {0}")]
    CameraAccess(String),
    #[error("camera produced no frames within {0:?}")]
    CaptureTimeout(Duration),
    #[error("calibration failed: {0}")]
    CalibrationFailed(#[from] CalibrationError),
    #[error("stimulus playback failed: {0}")]
    PlaybackFailed(String),
    #[error("session aborted")]
    Aborted,
    #[error("invalid phase transition {from} -> {to}")]
    InvalidTransition { from: SessionPhase, to: SessionPhase },
}

impl SessionError {
    /// Fault recorded in the phase; `None` for programming errors that
    /// leave the phase untouched.
    pub fn fault(&self) -> Option<SessionFault> {
        match self {
            Self::CameraAccess(_) => Some(SessionFault::CameraAccess),
            Self::CaptureTimeout(_) => Some(SessionFault::CaptureTimeout),
            Self::CalibrationFailed(_) => Some(SessionFault::CalibrationFailed),
            Self::PlaybackFailed(_) => Some(SessionFault::PlaybackFailed),
            Self::Aborted => Some(SessionFault::Aborted),
            Self::InvalidTransition { .. } => None,
        }
    }
}

impl From<CameraError> for SessionError {
    fn from(e: CameraError) -> Self {
        match e {
            CameraError::CaptureTimeout(after) => Self::CaptureTimeout(after),
            other => Self::CameraAccess(other.to_string()),
        }
    }
}

/// Fires once the owning [`CancelHandle`] cancels. A signal whose handle
/// was dropped never fires.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelSignal {
    pub fn pair() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx })
    }

    pub fn never() -> Self {
        Self::pair().1
    }

    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Clone)]
pub struct SessionDeps {
    pub camera: Arc<dyn CameraDevice>,
    pub presentation: Arc<dyn Presentation>,
    pub oracle: Arc<dyn FrameQualityOracle>,
    pub fitter: Arc<dyn CalibrationFitter>,
    pub predictor: Arc<dyn GazePredictor>,
    pub layout: Arc<dyn LayoutProvider>,
    pub player: Arc<dyn StimulusPlayer>,
    pub observer: Arc<dyn SessionObserver>,
}

impl SessionDeps {
    pub fn new<B>(
        camera: Arc<dyn CameraDevice>,
        presentation: Arc<dyn Presentation>,
        backend: Arc<B>,
        player: Arc<dyn StimulusPlayer>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self
    where
        B: GazeBackend + 'static,
    {
        Self {
            camera,
            presentation,
            oracle: backend.clone(),
            fitter: backend.clone(),
            predictor: backend.clone(),
            layout: backend,
            player,
            observer,
        }
    }
}

pub struct GazeSession {
    id: Uuid,
    config: SessionConfig,
    phase: SessionPhase,
    resources: SessionResources,
    orchestrator: CalibrationOrchestrator,
    tracking: TrackingLoop,
    layout_provider: Arc<dyn LayoutProvider>,
    layout: Option<Vec<CalibrationTarget>>,
    presentation: Arc<dyn Presentation>,
    player: Arc<dyn StimulusPlayer>,
    observer: Arc<dyn SessionObserver>,
    overlay: OverlayPublisher,
}

impl GazeSession {
    pub fn new(config: SessionConfig, deps: SessionDeps) -> Self {
        Self::with_constraints(config, deps, CaptureConstraints::default())
    }

    pub fn with_constraints(
        config: SessionConfig,
        deps: SessionDeps,
        constraints: CaptureConstraints,
    ) -> Self {
        let overlay = OverlayPublisher::new();
        let sampler = CalibrationSampler::new(
            SamplerConfig::from(&config),
            deps.oracle,
            FrameCodec::new(config.jpeg_quality),
            overlay.clone(),
        );
        let tracking = TrackingLoop::new(
            deps.predictor,
            FrameCodec::new(config.jpeg_quality),
            overlay.clone(),
            Duration::from_millis(config.tracking_poll_ms),
            deps.presentation.viewport(),
        );
        let resources = SessionResources::new(
            deps.camera,
            deps.presentation.clone(),
            constraints,
            config.camera_ready_timeout(),
        );

        Self {
            id: Uuid::new_v4(),
            phase: SessionPhase::Calibration,
            resources,
            orchestrator: CalibrationOrchestrator::new(sampler, deps.fitter),
            tracking,
            layout_provider: deps.layout,
            layout: None,
            presentation: deps.presentation,
            player: deps.player,
            observer: deps.observer,
            overlay,
            config,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn overlay(&self) -> &OverlayPublisher {
        &self.overlay
    }

    pub fn has_camera(&self) -> bool {
        self.resources.has_camera()
    }

    pub fn is_fullscreen_engaged(&self) -> bool {
        self.resources.is_fullscreen_engaged()
    }

    /// Runs a fresh session to completion. Cancelling `cancel` drops every
    /// pending timer and request and leaves the session in `Error(Aborted)`.
    pub async fn run(&mut self, mut cancel: CancelSignal) -> Result<TrackingSummary, SessionError> {
        if self.phase != SessionPhase::Calibration {
            return Err(SessionError::InvalidTransition {
                from: self.phase,
                to: SessionPhase::Calibration,
            });
        }
        tracing::info!(session_id = %self.id, "Gaze session starting");

        let outcome = tokio::select! {
            result = self.drive() => result,
            _ = cancel.cancelled() => Err(SessionError::Aborted),
        };

        match outcome {
            Ok(summary) => self.complete(summary),
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Leaves `Error` for a new calibration pass from target 0.
    pub async fn restart(&mut self, cancel: CancelSignal) -> Result<TrackingSummary, SessionError> {
        if !matches!(self.phase, SessionPhase::Error(_)) {
            return Err(SessionError::InvalidTransition {
                from: self.phase,
                to: SessionPhase::Calibration,
            });
        }
        self.transition(SessionPhase::Calibration)?;
        self.run(cancel).await
    }

    /// Caller-initiated teardown outside of a running pass.
    pub fn abort(&mut self) {
        self.teardown();
        let aborted = SessionPhase::Error(SessionFault::Aborted);
        if self.phase.can_transition_to(&aborted) {
            let _ = self.transition(aborted);
        }
    }

    pub fn teardown(&mut self) {
        self.player.stop();
        self.resources.teardown();
    }

    async fn drive(&mut self) -> Result<TrackingSummary, SessionError> {
        self.overlay.reset_for_calibration(0);
        self.resources.enter_fullscreen().await;
        if !self.resources.has_camera() {
            self.resources.acquire_camera().await?;
        }
        tokio::time::sleep(Duration::from_millis(self.config.calibration_lead_in_ms)).await;

        let targets = self.calibration_layout().await;
        self.overlay.reset_for_calibration(targets.len());
        let surface = self.resources.surface().clone();
        let screen = self.presentation.screen();
        self.orchestrator.calibrate(&targets, &surface, screen).await?;

        self.transition(SessionPhase::Stimulus)?;
        tokio::time::sleep(Duration::from_millis(self.config.stimulus_lead_in_ms)).await;

        let playback = self.player.subscribe();
        self.start_playback().await?;
        let summary = self.tracking.run(&surface, playback, SessionClock::start()).await;
        Ok(summary)
    }

    async fn calibration_layout(&mut self) -> Vec<CalibrationTarget> {
        if let Some(layout) = &self.layout {
            return layout.clone();
        }
        let layout = resolve_layout(self.layout_provider.as_ref(), self.presentation.screen()).await;
        self.layout = Some(layout.clone());
        layout
    }

    async fn start_playback(&mut self) -> Result<(), SessionError> {
        let attempts = self.config.max_play_attempts.max(1);
        for attempt in 1..=attempts {
            match self.player.play().await {
                Ok(()) => {
                    self.overlay.clear_status();
                    tracing::info!(session_id = %self.id, attempt, "Stimulus playback started");
                    return Ok(());
                }
                Err(PlaybackError::AutoplayBlocked) => {
                    tracing::warn!(session_id = %self.id, attempt, "Autoplay blocked");
                    self.overlay.set_status(AUTOPLAY_HINT);
                    if attempt < attempts {
                        tokio::time::sleep(Duration::from_millis(self.config.play_retry_delay_ms)).await;
                    }
                }
                Err(e) => return Err(SessionError::PlaybackFailed(e.to_string())),
            }
        }
        Err(SessionError::PlaybackFailed(
            PlaybackError::AutoplayBlocked.to_string(),
        ))
    }

    fn complete(&mut self, summary: TrackingSummary) -> Result<TrackingSummary, SessionError> {
        self.transition(SessionPhase::Complete)?;
        self.teardown();
        tracing::info!(session_id = %self.id, points = summary.points.len(), "Gaze session complete");
        self.observer.on_gaze_data(&summary.points);
        self.observer.on_complete();
        Ok(summary)
    }

    fn fail(&mut self, error: &SessionError) {
        let Some(fault) = error.fault() else {
            return;
        };
        self.player.stop();
        if fault.is_fatal() {
            self.resources.teardown();
            tracing::error!(session_id = %self.id, error = %error, "Gaze session failed");
        } else {
            tracing::warn!(session_id = %self.id, error = %error, "Gaze session failed, camera kept for retry");
        }
        let _ = self.transition(SessionPhase::Error(fault));
    }

    fn transition(&mut self, next: SessionPhase) -> Result<(), SessionError> {
        if !self.phase.can_transition_to(&next) {
            return Err(SessionError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::info!(session_id = %self.id, from = %self.phase, to = %next, "Session phase changed");
        self.phase = next;
        self.overlay.update(|s| s.phase = next);
        self.observer.on_phase(next);
        Ok(())
    }
}

impl Drop for GazeSession {
    fn drop(&mut self) {
        self.player.stop();
    }
}
