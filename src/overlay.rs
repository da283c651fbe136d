//! Overlay state published by the session for hosts to render.
//!
//! Hosts only read snapshots; nothing here feeds back into what the
//! session records.

use std::f64::consts::PI;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::types::{CalibrationTarget, ScreenPoint, SessionPhase, Viewport};

const PULSE_BASE_RADIUS: f64 = 15.0;
const PULSE_SWING_RADIUS: f64 = 15.0;
const COUNTDOWN_RADIUS: f64 = 20.0;
const COUNTDOWN_RING_RADIUS: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStep {
    Pulse,
    Countdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySnapshot {
    pub phase: SessionPhase,
    pub target_index: Option<usize>,
    pub target_count: usize,
    pub target: Option<CalibrationTarget>,
    pub step: Option<CalibrationStep>,
    pub pulse_progress: f64,
    pub countdown_progress: f64,
    pub status_text: Option<String>,
    pub cursor: Option<ScreenPoint>,
    pub gaze_points: usize,
    pub debug: bool,
}

impl Default for OverlaySnapshot {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Calibration,
            target_index: None,
            target_count: 0,
            target: None,
            step: None,
            pulse_progress: 0.0,
            countdown_progress: 0.0,
            status_text: None,
            cursor: None,
            gaze_points: 0,
            debug: false,
        }
    }
}

/// Geometry of the calibration marker for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetMarker {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    /// Countdown ring radius and sweep; zero during the pulse.
    pub ring_radius: f64,
    pub sweep_degrees: f64,
}

/// What the debug overlay shows. Rendering only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugReadout {
    pub gaze_points: usize,
    pub cursor: Option<ScreenPoint>,
    /// No prediction has arrived yet.
    pub waiting_for_predictions: bool,
}

impl OverlaySnapshot {
    pub fn debug_readout(&self) -> Option<DebugReadout> {
        self.debug.then_some(DebugReadout {
            gaze_points: self.gaze_points,
            cursor: self.cursor,
            waiting_for_predictions: self.cursor.is_none(),
        })
    }

    pub fn target_marker(&self, viewport: Viewport) -> Option<TargetMarker> {
        if self.phase != SessionPhase::Calibration {
            return None;
        }
        let target = self.target?;
        let center = viewport.to_screen(target.x, target.y);
        let marker = match self.step? {
            CalibrationStep::Pulse => TargetMarker {
                x: center.x,
                y: center.y,
                radius: pulse_radius(self.pulse_progress),
                ring_radius: 0.0,
                sweep_degrees: 0.0,
            },
            CalibrationStep::Countdown => TargetMarker {
                x: center.x,
                y: center.y,
                radius: COUNTDOWN_RADIUS,
                ring_radius: COUNTDOWN_RING_RADIUS,
                sweep_degrees: countdown_sweep_degrees(self.countdown_progress),
            },
        };
        Some(marker)
    }
}

/// Radius of the pulsing attention cue.
pub fn pulse_radius(progress: f64) -> f64 {
    PULSE_BASE_RADIUS + PULSE_SWING_RADIUS * (progress * 2.0 * PI).sin().abs()
}

/// Remaining arc of the countdown ring, eased with smoothstep.
pub fn countdown_sweep_degrees(progress: f64) -> f64 {
    let p = progress.clamp(0.0, 1.0);
    let ease = p * p * (3.0 - 2.0 * p);
    360.0 * (1.0 - ease)
}

#[derive(Clone)]
pub struct OverlayPublisher {
    tx: Arc<watch::Sender<OverlaySnapshot>>,
}

impl OverlayPublisher {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(OverlaySnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn update(&self, f: impl FnOnce(&mut OverlaySnapshot)) {
        self.tx.send_modify(f);
    }

    pub fn subscribe(&self) -> watch::Receiver<OverlaySnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> OverlaySnapshot {
        self.tx.borrow().clone()
    }

    pub fn set_status(&self, text: impl Into<String>) {
        let text = text.into();
        self.tx.send_if_modified(|s| {
            if s.status_text.as_deref() == Some(text.as_str()) {
                false
            } else {
                s.status_text = Some(text);
                true
            }
        });
    }

    pub fn clear_status(&self) {
        self.tx.send_if_modified(|s| s.status_text.take().is_some());
    }

    /// Flips the debug overlay. Returns the new setting.
    pub fn toggle_debug(&self) -> bool {
        let mut enabled = false;
        self.tx.send_modify(|s| {
            s.debug = !s.debug;
            enabled = s.debug;
        });
        enabled
    }

    pub fn reset_for_calibration(&self, target_count: usize) {
        self.tx.send_modify(|s| {
            let debug = s.debug;
            *s = OverlaySnapshot {
                target_count,
                debug,
                ..OverlaySnapshot::default()
            };
        });
    }
}

impl Default for OverlayPublisher {
    fn default() -> Self {
        Self::new()
    }
}
