use std::env;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use crate::constants::*;
use crate::types::Viewport;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub cors_origin: String,
    pub backend: BackendConfig,
    pub camera: CameraConfig,
    pub viewport: Viewport,
    pub stimulus: StimulusConfig,
    pub session: SessionConfig,
}

#[derive(Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub snapshot_url: String,
    pub fps: u32,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub ready_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct StimulusConfig {
    pub src: String,
    pub duration_secs: u64,
}

/// Timing and quality knobs of one gaze session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub pulse_ms: u64,
    pub calibration_poll_ms: u64,
    pub countdown_ms: u64,
    pub min_good_frames: usize,
    pub attempt_ceiling_ms: u64,
    /// Attempts allowed per calibration target; `None` retries forever.
    pub max_attempts_per_target: Option<u32>,
    pub tracking_poll_ms: u64,
    pub jpeg_quality: u8,
    pub camera_ready_timeout_ms: u64,
    pub calibration_lead_in_ms: u64,
    pub stimulus_lead_in_ms: u64,
    pub max_play_attempts: u32,
    pub play_retry_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pulse_ms: DEFAULT_PULSE_MS,
            calibration_poll_ms: DEFAULT_CALIBRATION_POLL_MS,
            countdown_ms: DEFAULT_COUNTDOWN_MS,
            min_good_frames: DEFAULT_MIN_GOOD_FRAMES,
            attempt_ceiling_ms: DEFAULT_ATTEMPT_CEILING_MS,
            max_attempts_per_target: None,
            tracking_poll_ms: DEFAULT_TRACKING_POLL_MS,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            camera_ready_timeout_ms: CAMERA_READY_TIMEOUT_SECS * 1_000,
            calibration_lead_in_ms: CALIBRATION_LEAD_IN_MS,
            stimulus_lead_in_ms: STIMULUS_LEAD_IN_MS,
            max_play_attempts: DEFAULT_MAX_PLAY_ATTEMPTS,
            play_retry_delay_ms: PLAY_RETRY_DELAY_MS,
        }
    }
}

impl SessionConfig {
    pub fn camera_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.camera_ready_timeout_ms)
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"***REDACTED***")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Self {
        let camera_ready_timeout_secs =
            env_or_parse("CAMERA_READY_TIMEOUT_SECS", CAMERA_READY_TIMEOUT_SECS);
        let max_attempts = env_or_parse("CALIBRATION_MAX_ATTEMPTS", 0_u32);

        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            cors_origin: env_or("CORS_ORIGIN", "*"),
            backend: BackendConfig {
                base_url: env_or("GAZE_API_URL", "http://127.0.0.1:8000/api"),
                api_key: env_or("GAZE_API_KEY", ""),
                timeout_secs: env_or_parse("GAZE_API_TIMEOUT_SECS", 30_u64),
            },
            camera: CameraConfig {
                snapshot_url: env_or("CAMERA_SNAPSHOT_URL", ""),
                fps: env_or_parse("CAMERA_FPS", 15_u32),
                ideal_width: env_or_parse("CAMERA_IDEAL_WIDTH", IDEAL_CAPTURE_WIDTH),
                ideal_height: env_or_parse("CAMERA_IDEAL_HEIGHT", IDEAL_CAPTURE_HEIGHT),
                ready_timeout_secs: camera_ready_timeout_secs,
            },
            viewport: Viewport::new(
                env_or_parse("VIEWPORT_WIDTH", 1920_u32),
                env_or_parse("VIEWPORT_HEIGHT", 1080_u32),
            ),
            stimulus: StimulusConfig {
                src: env_or("STIMULUS_SRC", "geopref_1min.mp4"),
                duration_secs: env_or_parse("STIMULUS_DURATION_SECS", DEFAULT_STIMULUS_SECS),
            },
            session: SessionConfig {
                pulse_ms: env_or_parse("CALIBRATION_PULSE_MS", DEFAULT_PULSE_MS),
                calibration_poll_ms: env_or_parse("CALIBRATION_POLL_MS", DEFAULT_CALIBRATION_POLL_MS),
                countdown_ms: env_or_parse("CALIBRATION_COUNTDOWN_MS", DEFAULT_COUNTDOWN_MS),
                min_good_frames: env_or_parse("CALIBRATION_MIN_GOOD_FRAMES", DEFAULT_MIN_GOOD_FRAMES),
                attempt_ceiling_ms: env_or_parse(
                    "CALIBRATION_ATTEMPT_CEILING_MS",
                    DEFAULT_ATTEMPT_CEILING_MS,
                ),
                max_attempts_per_target: (max_attempts > 0).then_some(max_attempts),
                tracking_poll_ms: env_or_parse("TRACKING_POLL_MS", DEFAULT_TRACKING_POLL_MS),
                jpeg_quality: env_or_parse("FRAME_JPEG_QUALITY", DEFAULT_JPEG_QUALITY),
                camera_ready_timeout_ms: camera_ready_timeout_secs * 1_000,
                calibration_lead_in_ms: CALIBRATION_LEAD_IN_MS,
                stimulus_lead_in_ms: STIMULUS_LEAD_IN_MS,
                max_play_attempts: env_or_parse("MAX_PLAY_ATTEMPTS", DEFAULT_MAX_PLAY_ATTEMPTS),
                play_retry_delay_ms: PLAY_RETRY_DELAY_MS,
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
