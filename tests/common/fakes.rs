use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use gaze_session::capture::{
    CameraDevice, CameraError, CaptureConstraints, CaptureStream, FrameSurface, RawFrame, SurfaceBinding,
};
use gaze_session::services::gaze_backend::{
    BackendError, CalibrationFitter, CalibrationRequest, CalibrationVerdict, FrameQualityOracle,
    GazePredictor, LayoutProvider,
};
use gaze_session::session::SessionObserver;
use gaze_session::stimulus::{PlaybackError, PlaybackState, StimulusPlayer};
use gaze_session::types::{
    CalibrationTarget, EncodedFrame, FrameQuality, GazeDataPoint, GazePrediction, SessionPhase,
    Viewport,
};

pub const FRAME_WIDTH: u32 = 64;
pub const FRAME_HEIGHT: u32 = 8;

/// 64x8 frame of eight 8x8 blocks, black or white by the bits of `id`, so
/// different ids encode to different JPEGs.
pub fn test_frame(id: u8) -> RawFrame {
    let mut pixels = Vec::with_capacity((FRAME_WIDTH * FRAME_HEIGHT * 3) as usize);
    for _y in 0..FRAME_HEIGHT {
        for x in 0..FRAME_WIDTH {
            let bit = (id >> (x / 8)) & 1;
            let v = if bit == 1 { 255 } else { 0 };
            pixels.extend_from_slice(&[v, v, v]);
        }
    }
    RawFrame::new(FRAME_WIDTH, FRAME_HEIGHT, pixels)
}

pub fn good() -> FrameQuality {
    FrameQuality {
        face_detected: true,
        blink_detected: false,
    }
}

pub fn blink() -> FrameQuality {
    FrameQuality {
        face_detected: true,
        blink_detected: true,
    }
}

pub fn no_face() -> FrameQuality {
    FrameQuality {
        face_detected: false,
        blink_detected: false,
    }
}

// ---------------------------------------------------------------------------
// Camera

#[derive(Default)]
pub struct CameraCounters {
    pub opened: AtomicUsize,
    pub stopped: AtomicUsize,
    pub live: AtomicUsize,
}

impl CameraCounters {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

pub struct FakeStream {
    counters: Arc<CameraCounters>,
    live: bool,
}

impl CaptureStream for FakeStream {
    fn stop(&mut self) {
        if std::mem::take(&mut self.live) {
            self.counters.stopped.fetch_add(1, Ordering::SeqCst);
            self.counters.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn label(&self) -> String {
        "fake-camera".to_string()
    }
}

pub struct FakeCamera {
    pub counters: Arc<CameraCounters>,
    pub deny: AtomicBool,
    pub silent: AtomicBool,
}

impl FakeCamera {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            counters: Arc::new(CameraCounters::default()),
            deny: AtomicBool::new(false),
            silent: AtomicBool::new(false),
        })
    }

    pub fn denying() -> Arc<Self> {
        let camera = Self::new();
        camera.deny.store(true, Ordering::SeqCst);
        camera
    }

    pub fn silent() -> Arc<Self> {
        let camera = Self::new();
        camera.silent.store(true, Ordering::SeqCst);
        camera
    }
}

#[async_trait]
impl CameraDevice for FakeCamera {
    async fn open(
        &self,
        _constraints: &CaptureConstraints,
        surface: SurfaceBinding,
    ) -> Result<Box<dyn CaptureStream>, CameraError> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(CameraError::PermissionDenied("user dismissed prompt".to_string()));
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        self.counters.live.fetch_add(1, Ordering::SeqCst);
        if !self.silent.load(Ordering::SeqCst) {
            surface.publish(test_frame(1));
        }
        Ok(Box::new(FakeStream {
            counters: self.counters.clone(),
            live: true,
        }))
    }
}

// ---------------------------------------------------------------------------
// Gaze backend

type OracleScript = Box<dyn FnMut(usize) -> Result<FrameQuality, BackendError> + Send>;
type PredictScript = Box<dyn FnMut(usize) -> (Result<GazePrediction, BackendError>, Duration) + Send>;

/// Scripted gaze service. Scripts receive the 1-based call number.
pub struct FakeBackend {
    oracle: Mutex<OracleScript>,
    predictor: Mutex<PredictScript>,
    verdicts: Mutex<VecDeque<Result<CalibrationVerdict, BackendError>>>,
    layout: Mutex<Option<Vec<CalibrationTarget>>>,
    rotate: Mutex<Option<FrameSurface>>,
    check_calls: AtomicUsize,
    predict_calls: AtomicUsize,
    layout_calls: AtomicUsize,
    checked: Mutex<Vec<EncodedFrame>>,
    requests: Mutex<Vec<CalibrationRequest>>,
}

pub fn calibrated() -> CalibrationVerdict {
    CalibrationVerdict {
        status: "calibrated".to_string(),
        message: None,
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            oracle: Mutex::new(Box::new(|_| Ok(good()))),
            predictor: Mutex::new(Box::new(|_| {
                (
                    Ok(GazePrediction {
                        x: 0.25,
                        y: 0.5,
                        calibrated: true,
                    }),
                    Duration::ZERO,
                )
            })),
            verdicts: Mutex::new(VecDeque::new()),
            layout: Mutex::new(None),
            rotate: Mutex::new(None),
            check_calls: AtomicUsize::new(0),
            predict_calls: AtomicUsize::new(0),
            layout_calls: AtomicUsize::new(0),
            checked: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_oracle(
        self,
        script: impl FnMut(usize) -> Result<FrameQuality, BackendError> + Send + 'static,
    ) -> Self {
        *self.oracle.lock().unwrap() = Box::new(script);
        self
    }

    pub fn with_predictor(
        self,
        script: impl FnMut(usize) -> (Result<GazePrediction, BackendError>, Duration) + Send + 'static,
    ) -> Self {
        *self.predictor.lock().unwrap() = Box::new(script);
        self
    }

    pub fn with_layout(self, layout: Vec<CalibrationTarget>) -> Self {
        *self.layout.lock().unwrap() = Some(layout);
        self
    }

    /// Publishes a fresh frame into `surface` after every quality check.
    pub fn rotating_frames(self, surface: FrameSurface) -> Self {
        *self.rotate.lock().unwrap() = Some(surface);
        self
    }

    pub fn push_verdict(&self, verdict: Result<CalibrationVerdict, BackendError>) {
        self.verdicts.lock().unwrap().push_back(verdict);
    }

    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    pub fn predict_calls(&self) -> usize {
        self.predict_calls.load(Ordering::SeqCst)
    }

    pub fn layout_calls(&self) -> usize {
        self.layout_calls.load(Ordering::SeqCst)
    }

    pub fn checked_frames(&self) -> Vec<EncodedFrame> {
        self.checked.lock().unwrap().clone()
    }

    pub fn calibration_requests(&self) -> Vec<CalibrationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl FrameQualityOracle for FakeBackend {
    async fn check_frame(&self, frame: &EncodedFrame) -> Result<FrameQuality, BackendError> {
        let call = self.check_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.checked.lock().unwrap().push(frame.clone());
        let result = (self.oracle.lock().unwrap())(call);
        if let Some(surface) = self.rotate.lock().unwrap().as_ref() {
            surface.publish(test_frame((call % 255 + 1) as u8));
        }
        result
    }
}

#[async_trait]
impl CalibrationFitter for FakeBackend {
    async fn submit_calibration(
        &self,
        request: &CalibrationRequest,
    ) -> Result<CalibrationVerdict, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        self.verdicts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(calibrated()))
    }
}

#[async_trait]
impl GazePredictor for FakeBackend {
    async fn predict_gaze(&self, _frame: &EncodedFrame) -> Result<GazePrediction, BackendError> {
        let call = self.predict_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let (result, delay) = (self.predictor.lock().unwrap())(call);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

#[async_trait]
impl LayoutProvider for FakeBackend {
    async fn calibration_layout(
        &self,
        _screen: Viewport,
    ) -> Result<Vec<CalibrationTarget>, BackendError> {
        self.layout_calls.fetch_add(1, Ordering::SeqCst);
        self.layout
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| BackendError::Network("layout endpoint offline".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Stimulus

/// Player whose autoplay refusals and end of playback are scripted.
pub struct ScriptedStimulus {
    state: Arc<watch::Sender<PlaybackState>>,
    blocked_remaining: AtomicU32,
    auto_end: Option<Duration>,
    pub plays: AtomicU32,
    pub stops: AtomicU32,
}

impl ScriptedStimulus {
    pub fn new(auto_end: Option<Duration>) -> Arc<Self> {
        Self::blocking(0, auto_end)
    }

    pub fn blocking(blocked: u32, auto_end: Option<Duration>) -> Arc<Self> {
        let (state, _) = watch::channel(PlaybackState::Idle);
        Arc::new(Self {
            state: Arc::new(state),
            blocked_remaining: AtomicU32::new(blocked),
            auto_end,
            plays: AtomicU32::new(0),
            stops: AtomicU32::new(0),
        })
    }

    pub fn plays(&self) -> u32 {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn end(&self) {
        self.state.send_replace(PlaybackState::Ended);
    }
}

#[async_trait]
impl StimulusPlayer for ScriptedStimulus {
    async fn play(&self) -> Result<(), PlaybackError> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        let blocked = self
            .blocked_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if blocked {
            return Err(PlaybackError::AutoplayBlocked);
        }

        self.state.send_replace(PlaybackState::Playing);
        if let Some(after) = self.auto_end {
            let state = self.state.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                state.send_if_modified(|s| {
                    if *s == PlaybackState::Playing {
                        *s = PlaybackState::Ended;
                        true
                    } else {
                        false
                    }
                });
            });
        }
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state.subscribe()
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.state.send_if_modified(|s| {
            if matches!(s, PlaybackState::Playing | PlaybackState::Paused) {
                *s = PlaybackState::Idle;
                true
            } else {
                false
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Observer

#[derive(Default)]
pub struct RecordingObserver {
    pub gaze_data: Mutex<Vec<Vec<GazeDataPoint>>>,
    pub completions: AtomicUsize,
    pub phases: Mutex<Vec<SessionPhase>>,
    /// Live camera streams seen when `on_gaze_data` fired.
    pub live_streams_at_data: Mutex<Option<usize>>,
    camera: Option<Arc<CameraCounters>>,
}

impl RecordingObserver {
    pub fn watching(camera: Arc<CameraCounters>) -> Arc<Self> {
        Arc::new(Self {
            camera: Some(camera),
            ..Self::default()
        })
    }

    pub fn gaze_calls(&self) -> usize {
        self.gaze_data.lock().unwrap().len()
    }

    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    pub fn phases(&self) -> Vec<SessionPhase> {
        self.phases.lock().unwrap().clone()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_gaze_data(&self, points: &[GazeDataPoint]) {
        if let Some(camera) = &self.camera {
            *self.live_streams_at_data.lock().unwrap() = Some(camera.live());
        }
        self.gaze_data.lock().unwrap().push(points.to_vec());
    }

    fn on_complete(&self) {
        self.completions.fetch_add(1, Ordering::SeqCst);
    }

    fn on_phase(&self, phase: SessionPhase) {
        self.phases.lock().unwrap().push(phase);
    }
}
