use std::fmt;

use serde::{Deserialize, Serialize};

/// Normalized on-screen position of a calibration target, `(x, y) ∈ [0,1]²`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTarget {
    pub x: f64,
    pub y: f64,
}

impl CalibrationTarget {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_normalized(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }

    /// True when `(x, y)` lies within `tolerance` of this target on both axes.
    pub fn matches(&self, x: f64, y: f64, tolerance: f64) -> bool {
        (self.x - x).abs() < tolerance && (self.y - y).abs() < tolerance
    }
}

/// Pixel dimensions of a presentation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn midline(&self) -> f64 {
        f64::from(self.width) / 2.0
    }

    /// Maps a normalized position onto this viewport's pixel grid.
    pub fn to_screen(&self, x: f64, y: f64) -> ScreenPoint {
        ScreenPoint {
            x: x * f64::from(self.width),
            y: y * f64::from(self.height),
        }
    }

    /// Social content is rendered on the left half of the screen.
    pub fn is_social(&self, screen_x: f64) -> bool {
        screen_x < self.midline()
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

/// Base64 text of a compressed still image, ready for transmission.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedFrame(String);

impl EncodedFrame {
    pub fn new(encoded: String) -> Self {
        Self(encoded)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for EncodedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodedFrame({} bytes)", self.0.len())
    }
}

/// A good frame captured while the subject looked at a target.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSample {
    pub frame: EncodedFrame,
    pub target_x: f64,
    pub target_y: f64,
}

impl CalibrationSample {
    pub fn new(frame: EncodedFrame, target: CalibrationTarget) -> Self {
        Self {
            frame,
            target_x: target.x,
            target_y: target.y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameQuality {
    #[serde(default)]
    pub face_detected: bool,
    #[serde(default)]
    pub blink_detected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazePrediction {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub calibrated: bool,
}

/// One recorded gaze sample in screen pixels. Never mutated once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeDataPoint {
    /// Capture time, epoch milliseconds.
    pub timestamp: i64,
    pub x: f64,
    pub y: f64,
    pub social_region: bool,
}

/// Why a session sits in the error phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionFault {
    CameraAccess,
    CaptureTimeout,
    CalibrationFailed,
    PlaybackFailed,
    Aborted,
}

impl SessionFault {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CameraAccess => "camera_access",
            Self::CaptureTimeout => "capture_timeout",
            Self::CalibrationFailed => "calibration_failed",
            Self::PlaybackFailed => "playback_failed",
            Self::Aborted => "aborted",
        }
    }

    /// Faults that release the camera; the operator must retry explicitly.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::CameraAccess | Self::CaptureTimeout | Self::Aborted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "fault", rename_all = "snake_case")]
pub enum SessionPhase {
    Calibration,
    Stimulus,
    Complete,
    Error(SessionFault),
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calibration => "calibration",
            Self::Stimulus => "stimulus",
            Self::Complete => "complete",
            Self::Error(_) => "error",
        }
    }

    /// Phases only move forward; `Error` is reachable from anywhere and
    /// left only through a restart back to `Calibration`.
    pub fn can_transition_to(&self, next: &SessionPhase) -> bool {
        match (self, next) {
            (Self::Calibration, Self::Stimulus) => true,
            (Self::Stimulus, Self::Complete) => true,
            (Self::Error(_), Self::Calibration) => true,
            (Self::Complete, _) => false,
            (Self::Error(_), Self::Error(_)) => false,
            (_, Self::Error(_)) => true,
            _ => false,
        }
    }
}

impl Default for SessionPhase {
    fn default() -> Self {
        Self::Calibration
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(fault) => write!(f, "error({})", fault.as_str()),
            other => f.write_str(other.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn social_region_is_left_of_midline() {
        let vp = Viewport::new(1000, 800);
        assert!(vp.is_social(499.9));
        assert!(!vp.is_social(500.0));
        assert!(!vp.is_social(900.0));
    }

    #[test]
    fn to_screen_scales_both_axes() {
        let vp = Viewport::new(1920, 1080);
        let p = vp.to_screen(0.25, 0.5);
        assert_eq!(p.x, 480.0);
        assert_eq!(p.y, 540.0);
    }

    #[test]
    fn target_matching_uses_open_tolerance() {
        let t = CalibrationTarget::new(0.5, 0.5);
        assert!(t.matches(0.52, 0.48, 0.05));
        assert!(!t.matches(0.56, 0.5, 0.05));
    }

    #[test]
    fn phases_only_move_forward() {
        use SessionPhase::*;
        assert!(Calibration.can_transition_to(&Stimulus));
        assert!(Stimulus.can_transition_to(&Complete));
        assert!(!Stimulus.can_transition_to(&Calibration));
        assert!(!Complete.can_transition_to(&Calibration));
        assert!(!Complete.can_transition_to(&Error(SessionFault::Aborted)));
        assert!(Stimulus.can_transition_to(&Error(SessionFault::PlaybackFailed)));
        assert!(Error(SessionFault::CalibrationFailed).can_transition_to(&Calibration));
        assert!(!Error(SessionFault::CalibrationFailed).can_transition_to(&Stimulus));
    }

    #[test]
    fn phase_serializes_with_fault() {
        let json = serde_json::to_value(SessionPhase::Error(SessionFault::CaptureTimeout)).unwrap();
        assert_eq!(json["phase"], "error");
        assert_eq!(json["fault"], "capture_timeout");
        let json = serde_json::to_value(SessionPhase::Stimulus).unwrap();
        assert_eq!(json["phase"], "stimulus");
    }

    #[test]
    fn frame_quality_defaults_missing_fields() {
        let q: FrameQuality = serde_json::from_str(r#"{"face_detected":true}"#).unwrap();
        assert!(q.face_detected && !q.blink_detected);
    }
}
