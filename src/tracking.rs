//! Real-time gaze tracking while the stimulus plays.
//!
//! Ticks on a fixed cadence, lets predictions overlap, and reconciles
//! their results through a monotonic sequence number so the recorded
//! stream never goes back in time.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::capture::FrameSurface;
use crate::codec::FrameCodec;
use crate::overlay::OverlayPublisher;
use crate::services::gaze_backend::GazePredictor;
use crate::stimulus::PlaybackState;
use crate::types::{GazeDataPoint, GazePrediction, Viewport};

/// Wall-clock timestamps derived from the runtime's monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    origin_ms: i64,
    origin: Instant,
}

impl SessionClock {
    pub fn start() -> Self {
        Self {
            origin_ms: chrono::Utc::now().timestamp_millis(),
            origin: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.origin_ms.saturating_add(elapsed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Recorded,
    /// Recorded, but a newer pointer-only result already moved the cursor.
    RecordedLate,
    PointerOnly,
    Stale,
}

/// Append-only store of calibrated gaze points.
#[derive(Debug)]
pub struct GazeAccumulator {
    viewport: Viewport,
    points: Vec<GazeDataPoint>,
    latest_seq: Option<u64>,
    recorded_seq: Option<u64>,
}

impl GazeAccumulator {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            points: Vec::new(),
            latest_seq: None,
            recorded_seq: None,
        }
    }

    /// Applies a prediction issued as `seq` for a frame captured at
    /// `captured_at`. A calibrated result is appended unless a newer one is
    /// already recorded; a pointer-only result only counts if it is the
    /// newest result seen.
    pub fn apply(&mut self, seq: u64, captured_at: i64, prediction: &GazePrediction) -> Applied {
        let newest = self.latest_seq.map_or(true, |latest| seq > latest);
        if !prediction.calibrated {
            if !newest {
                return Applied::Stale;
            }
            self.latest_seq = Some(seq);
            return Applied::PointerOnly;
        }
        if self.recorded_seq.is_some_and(|recorded| seq <= recorded) {
            return Applied::Stale;
        }
        self.recorded_seq = Some(seq);
        if newest {
            self.latest_seq = Some(seq);
        }

        let screen = self.viewport.to_screen(prediction.x, prediction.y);
        self.points.push(GazeDataPoint {
            timestamp: captured_at,
            x: screen.x,
            y: screen.y,
            social_region: self.viewport.is_social(screen.x),
        });
        if newest {
            Applied::Recorded
        } else {
            Applied::RecordedLate
        }
    }

    pub fn points(&self) -> &[GazeDataPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn into_points(self) -> Vec<GazeDataPoint> {
        self.points
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackingSummary {
    pub points: Vec<GazeDataPoint>,
    pub ticks: u64,
    pub skipped_ticks: u64,
    pub predictions: u64,
    pub uncalibrated: u64,
    pub failures: u64,
    pub stale: u64,
}

pub struct TrackingLoop {
    predictor: Arc<dyn GazePredictor>,
    codec: FrameCodec,
    overlay: OverlayPublisher,
    poll: Duration,
    viewport: Viewport,
}

impl TrackingLoop {
    pub fn new(
        predictor: Arc<dyn GazePredictor>,
        codec: FrameCodec,
        overlay: OverlayPublisher,
        poll: Duration,
        viewport: Viewport,
    ) -> Self {
        Self {
            predictor,
            codec,
            overlay,
            poll: poll.max(Duration::from_millis(1)),
            viewport,
        }
    }

    /// Tracks until playback reports `Ended`. In-flight predictions are
    /// dropped at that moment and never reach the stream.
    pub async fn run(
        &mut self,
        surface: &FrameSurface,
        mut playback: watch::Receiver<PlaybackState>,
        clock: SessionClock,
    ) -> TrackingSummary {
        let mut summary = TrackingSummary::default();
        let mut accumulator = GazeAccumulator::new(self.viewport);
        let mut in_flight = FuturesUnordered::new();
        let mut next_seq: u64 = 0;

        let mut ticker = interval(self.poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(poll_ms = self.poll.as_millis() as u64, "Gaze tracking started");

        loop {
            tokio::select! {
                biased;

                changed = playback.changed() => {
                    if changed.is_err() || *playback.borrow_and_update() == PlaybackState::Ended {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    summary.ticks += 1;
                    let state = *playback.borrow();
                    match state {
                        PlaybackState::Ended => break,
                        PlaybackState::Playing => {}
                        PlaybackState::Idle | PlaybackState::Paused => {
                            summary.skipped_ticks += 1;
                            continue;
                        }
                    }

                    let Some(frame) = self.codec.encode(surface).filter(|f| !f.is_empty()) else {
                        continue;
                    };
                    next_seq += 1;
                    let seq = next_seq;
                    let captured_at = clock.now_ms();
                    let predictor = self.predictor.clone();
                    summary.predictions += 1;
                    in_flight.push(async move {
                        let result = predictor.predict_gaze(&frame).await;
                        (seq, captured_at, result)
                    });
                }

                Some((seq, captured_at, result)) = in_flight.next(), if !in_flight.is_empty() => {
                    let prediction = match result {
                        Ok(p) => p,
                        Err(e) => {
                            summary.failures += 1;
                            tracing::warn!(seq, error = %e, "Gaze prediction failed, skipping tick");
                            continue;
                        }
                    };
                    match accumulator.apply(seq, captured_at, &prediction) {
                        Applied::Stale => {
                            summary.stale += 1;
                            tracing::debug!(seq, "Discarding out-of-order prediction");
                            continue;
                        }
                        Applied::PointerOnly => {
                            summary.uncalibrated += 1;
                            tracing::debug!(seq, "Prediction not calibrated, pointer only");
                        }
                        Applied::RecordedLate => {
                            let recorded = accumulator.len();
                            self.overlay.update(|s| s.gaze_points = recorded);
                            continue;
                        }
                        Applied::Recorded => {}
                    }
                    let cursor = self.viewport.to_screen(prediction.x, prediction.y);
                    let recorded = accumulator.len();
                    self.overlay.update(|s| {
                        s.cursor = Some(cursor);
                        s.gaze_points = recorded;
                    });
                }
            }
        }

        if !in_flight.is_empty() {
            tracing::debug!(pending = in_flight.len(), "Dropping in-flight predictions");
        }
        drop(in_flight);

        summary.points = accumulator.into_points();
        tracing::info!(
            points = summary.points.len(),
            ticks = summary.ticks,
            predictions = summary.predictions,
            uncalibrated = summary.uncalibrated,
            failures = summary.failures,
            "Gaze tracking finished"
        );
        summary
    }
}
