//! Per-target frame collection: a cosmetic pulse followed by a countdown
//! that polls the frame-quality oracle until enough good frames arrive.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

use crate::capture::FrameSurface;
use crate::codec::FrameCodec;
use crate::config::SessionConfig;
use crate::constants::{MIN_ENCODED_FRAME_LEN, PULSE_FRAME_MS};
use crate::overlay::{CalibrationStep, OverlayPublisher};
use crate::services::gaze_backend::FrameQualityOracle;
use crate::types::{CalibrationSample, CalibrationTarget};

pub const FACE_NOT_DETECTED: &str = "Face not detected - please look at the camera";
pub const BLINK_DETECTED: &str = "Blink detected - restarting this point";
pub const NOT_ENOUGH_FRAMES: &str = "Not enough clear frames - restarting this point";

/// Progress line shown while good frames accumulate.
pub fn collecting_status(good: usize, required: usize) -> String {
    format!("Collecting {good}/{required}")
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    pub pulse: Duration,
    pub poll: Duration,
    pub countdown: Duration,
    pub min_good_frames: usize,
    pub ceiling: Duration,
    pub max_attempts: Option<u32>,
}

impl From<&SessionConfig> for SamplerConfig {
    fn from(cfg: &SessionConfig) -> Self {
        Self {
            pulse: Duration::from_millis(cfg.pulse_ms),
            poll: Duration::from_millis(cfg.calibration_poll_ms.max(1)),
            countdown: Duration::from_millis(cfg.countdown_ms),
            min_good_frames: cfg.min_good_frames,
            ceiling: Duration::from_millis(cfg.attempt_ceiling_ms),
            max_attempts: cfg.max_attempts_per_target,
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Complete(Vec<CalibrationSample>),
    Blink,
    Insufficient { good: usize },
}

/// Samples accepted for one target plus how they were obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetReport {
    pub index: usize,
    pub target: CalibrationTarget,
    pub samples: Vec<CalibrationSample>,
    pub attempts: u32,
    pub blink_restarts: u32,
    pub insufficient_retries: u32,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SamplerError {
    #[error("target {target_index} gave up after {attempts} attempts")]
    AttemptsExhausted { target_index: usize, attempts: u32 },
}

pub struct CalibrationSampler {
    config: SamplerConfig,
    oracle: Arc<dyn FrameQualityOracle>,
    codec: FrameCodec,
    overlay: OverlayPublisher,
}

impl CalibrationSampler {
    pub fn new(
        config: SamplerConfig,
        oracle: Arc<dyn FrameQualityOracle>,
        codec: FrameCodec,
        overlay: OverlayPublisher,
    ) -> Self {
        Self {
            config,
            oracle,
            codec,
            overlay,
        }
    }

    /// Runs pulse + countdown attempts for one target until an attempt
    /// completes cleanly. Frames of failed attempts never leave this call.
    pub async fn collect_target(
        &mut self,
        index: usize,
        target: CalibrationTarget,
        surface: &FrameSurface,
    ) -> Result<TargetReport, SamplerError> {
        let mut report = TargetReport {
            index,
            target,
            samples: Vec::new(),
            attempts: 0,
            blink_restarts: 0,
            insufficient_retries: 0,
        };

        loop {
            if let Some(max) = self.config.max_attempts {
                if report.attempts >= max {
                    tracing::error!(target_index = index, attempts = report.attempts, "Calibration target gave up");
                    return Err(SamplerError::AttemptsExhausted {
                        target_index: index,
                        attempts: report.attempts,
                    });
                }
            }
            report.attempts += 1;

            self.pulse(index, target).await;
            match self.countdown(index, target, surface).await {
                AttemptOutcome::Complete(samples) => {
                    tracing::info!(
                        target_index = index,
                        attempt = report.attempts,
                        samples = samples.len(),
                        "Calibration target collected"
                    );
                    self.overlay.clear_status();
                    report.samples = samples;
                    return Ok(report);
                }
                AttemptOutcome::Blink => {
                    tracing::info!(target_index = index, attempt = report.attempts, "Blink detected, restarting target");
                    report.blink_restarts += 1;
                    self.overlay.set_status(BLINK_DETECTED);
                }
                AttemptOutcome::Insufficient { good } => {
                    tracing::warn!(
                        target_index = index,
                        attempt = report.attempts,
                        good,
                        required = self.config.min_good_frames,
                        "Attempt ceiling reached, restarting target"
                    );
                    report.insufficient_retries += 1;
                    self.overlay.set_status(NOT_ENOUGH_FRAMES);
                }
            }
        }
    }

    async fn pulse(&self, index: usize, target: CalibrationTarget) {
        self.overlay.update(|s| {
            s.target_index = Some(index);
            s.target = Some(target);
            s.step = Some(CalibrationStep::Pulse);
            s.pulse_progress = 0.0;
            s.countdown_progress = 0.0;
        });

        let pulse = self.config.pulse;
        if pulse.is_zero() {
            return;
        }
        let started = Instant::now();
        let done = sleep_until(started + pulse);
        tokio::pin!(done);
        let mut frames = interval(Duration::from_millis(PULSE_FRAME_MS));
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = &mut done => break,
                _ = frames.tick() => {
                    let progress = started.elapsed().as_secs_f64() / pulse.as_secs_f64();
                    self.overlay.update(|s| s.pulse_progress = progress.min(1.0));
                }
            }
        }
        self.overlay.update(|s| s.pulse_progress = 1.0);
    }

    async fn countdown(
        &mut self,
        index: usize,
        target: CalibrationTarget,
        surface: &FrameSurface,
    ) -> AttemptOutcome {
        // The previous attempt's retry reason stays up through the pulse only.
        self.overlay.update(|s| {
            s.step = Some(CalibrationStep::Countdown);
            s.countdown_progress = 0.0;
            s.status_text = None;
        });

        let SamplerConfig {
            poll,
            countdown,
            min_good_frames,
            ceiling,
            ..
        } = self.config.clone();
        let mut samples = Vec::with_capacity(min_good_frames);
        let started = Instant::now();
        let mut ticker = interval(poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let elapsed = started.elapsed();
            let keep_going = (elapsed < countdown || samples.len() < min_good_frames) && elapsed < ceiling;
            if !keep_going {
                break;
            }
            let progress = if countdown.is_zero() {
                1.0
            } else {
                (elapsed.as_secs_f64() / countdown.as_secs_f64()).min(1.0)
            };
            self.overlay.update(|s| s.countdown_progress = progress);

            let Some(frame) = self.codec.encode(surface) else {
                continue;
            };
            if frame.len() <= MIN_ENCODED_FRAME_LEN {
                continue;
            }

            let quality = match self.oracle.check_frame(&frame).await {
                Ok(q) => q,
                Err(e) => {
                    tracing::warn!(target_index = index, error = %e, "Frame quality check failed, skipping frame");
                    continue;
                }
            };

            if !quality.face_detected {
                self.overlay.set_status(FACE_NOT_DETECTED);
                continue;
            }
            if quality.blink_detected {
                return AttemptOutcome::Blink;
            }
            samples.push(CalibrationSample::new(frame, target));
            self.overlay
                .set_status(collecting_status(samples.len(), min_good_frames));
        }

        if samples.len() >= min_good_frames {
            AttemptOutcome::Complete(samples)
        } else {
            AttemptOutcome::Insufficient { good: samples.len() }
        }
    }
}
