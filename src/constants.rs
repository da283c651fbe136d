/// Pulse (attention cue) duration per calibration attempt, in milliseconds.
pub const DEFAULT_PULSE_MS: u64 = 1_000;

/// Frame interval of the pulse animation progress updates (~60fps).
pub const PULSE_FRAME_MS: u64 = 16;

/// Minimum countdown (collection) duration per attempt, in milliseconds.
pub const DEFAULT_COUNTDOWN_MS: u64 = 1_000;

/// Polling cadence while collecting calibration frames.
pub const DEFAULT_CALIBRATION_POLL_MS: u64 = 100;

/// Good frames required per calibration target.
pub const DEFAULT_MIN_GOOD_FRAMES: usize = 12;

/// Hard wall-clock ceiling of one collection attempt.
pub const DEFAULT_ATTEMPT_CEILING_MS: u64 = 5_000;

/// Polling cadence of the gaze predictor during the stimulus.
pub const DEFAULT_TRACKING_POLL_MS: u64 = 100;

/// How long the camera surface may take to produce its first frame.
pub const CAMERA_READY_TIMEOUT_SECS: u64 = 10;

/// Ideal capture resolution requested from the camera.
pub const IDEAL_CAPTURE_WIDTH: u32 = 1_280;
pub const IDEAL_CAPTURE_HEIGHT: u32 = 720;

/// JPEG quality used by the frame codec.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Encoded frames at or below this length are treated as empty during calibration.
pub const MIN_ENCODED_FRAME_LEN: usize = 100;

/// Per-axis tolerance when matching a sample to its calibration target.
pub const TARGET_MATCH_TOLERANCE: f64 = 0.05;

/// Chunk size used to label samples that match no known target.
pub const FALLBACK_POINT_CHUNK: usize = 30;

/// Pause between camera readiness and the first calibration target.
pub const CALIBRATION_LEAD_IN_MS: u64 = 1_000;

/// Pause between a successful calibration and stimulus playback.
pub const STIMULUS_LEAD_IN_MS: u64 = 500;

/// Playback attempts made before an autoplay refusal becomes fatal to the run.
pub const DEFAULT_MAX_PLAY_ATTEMPTS: u32 = 3;

/// Delay between playback attempts after an autoplay refusal.
pub const PLAY_RETRY_DELAY_MS: u64 = 1_000;

/// Default stimulus length (the screening video runs one minute).
pub const DEFAULT_STIMULUS_SECS: u64 = 60;

/// Status reported by the calibration fitter on success.
pub const CALIBRATED_STATUS: &str = "calibrated";
