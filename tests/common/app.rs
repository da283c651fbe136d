use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use gaze_session::config::{BackendConfig, CameraConfig, Config, SessionConfig, StimulusConfig};
use gaze_session::presentation::HeadlessPresentation;
use gaze_session::routes::build_router;
use gaze_session::session::runner::{ReportSink, SessionHandle};
use gaze_session::session::{GazeSession, SessionDeps};
use gaze_session::state::AppState;
use gaze_session::types::Viewport;

use super::fakes::{FakeBackend, FakeCamera, ScriptedStimulus};

pub const TEST_VIEWPORT: Viewport = Viewport::new(1000, 800);

/// Short timings so a whole session fits in a few simulated seconds.
pub fn fast_session_config() -> SessionConfig {
    SessionConfig {
        pulse_ms: 0,
        calibration_poll_ms: 10,
        countdown_ms: 50,
        min_good_frames: 3,
        attempt_ceiling_ms: 500,
        max_attempts_per_target: None,
        tracking_poll_ms: 20,
        jpeg_quality: 80,
        camera_ready_timeout_ms: 1_000,
        calibration_lead_in_ms: 0,
        stimulus_lead_in_ms: 0,
        max_play_attempts: 3,
        play_retry_delay_ms: 100,
    }
}

pub fn test_config() -> Config {
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 0,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        cors_origin: "*".to_string(),
        backend: BackendConfig {
            base_url: "http://127.0.0.1:9/api".to_string(),
            api_key: String::new(),
            timeout_secs: 5,
        },
        camera: CameraConfig {
            snapshot_url: "http://127.0.0.1:9/snapshot.jpg".to_string(),
            fps: 10,
            ideal_width: 640,
            ideal_height: 480,
            ready_timeout_secs: 1,
        },
        viewport: TEST_VIEWPORT,
        stimulus: StimulusConfig {
            src: "test.mp4".to_string(),
            duration_secs: 60,
        },
        session: fast_session_config(),
    }
}

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub handle: SessionHandle,
    pub backend: Arc<FakeBackend>,
    pub camera: Arc<FakeCamera>,
    pub player: Arc<ScriptedStimulus>,
    pub runner: JoinHandle<()>,
}

impl TestApp {
    /// Yields in simulated time until the session reaches `phase`.
    pub async fn wait_for_phase(&self, phase: &str) {
        for _ in 0..1_000 {
            if self.handle.phase().as_str() == phase {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session never reached {phase}, stuck in {}", self.handle.phase());
    }
}

pub async fn spawn_test_app(player: Arc<ScriptedStimulus>) -> TestApp {
    spawn_with(FakeBackend::new(), FakeCamera::new(), player).await
}

pub async fn spawn_with(
    backend: FakeBackend,
    camera: Arc<FakeCamera>,
    player: Arc<ScriptedStimulus>,
) -> TestApp {
    let config = test_config();
    let backend = Arc::new(backend);
    let sink = Arc::new(ReportSink::new(config.stimulus.duration_secs as f64));
    let reports = sink.store();

    let deps = SessionDeps::new(
        camera.clone(),
        Arc::new(HeadlessPresentation::new(config.viewport)),
        backend.clone(),
        player.clone(),
        sink,
    );
    let session = GazeSession::new(config.session.clone(), deps);
    let (handle, runner) = SessionHandle::spawn(session, reports);

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(handle.clone(), &config, shutdown_tx);
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        handle,
        backend,
        camera,
        player,
        runner,
    }
}
