//! Seams to the remote gaze service: frame-quality oracle, calibration
//! fitter, gaze predictor and calibration layout provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::constants::CALIBRATED_STATUS;
use crate::types::{CalibrationTarget, EncodedFrame, FrameQuality, GazePrediction, Viewport};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("gaze service request timed out")]
    Timeout,
    #[error("gaze service network error: {0}")]
    Network(String),
    #[error("gaze service api error: status={status}, message={message}")]
    ApiError { status: u16, message: String },
    #[error("gaze service returned an unreadable body: {0}")]
    Decode(String),
    #[error("invalid gaze service url: {0}")]
    InvalidUrl(String),
    #[error("gaze prediction failed for this frame")]
    PredictionFailed,
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Network(e.to_string())
        }
    }
}

/// One calibration sample as submitted to the fitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFrame {
    pub frame: EncodedFrame,
    pub target_x: f64,
    pub target_y: f64,
    pub point_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRequest {
    pub frames: Vec<CalibrationFrame>,
    pub screen_width: u32,
    pub screen_height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationVerdict {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl CalibrationVerdict {
    pub fn is_calibrated(&self) -> bool {
        self.status == CALIBRATED_STATUS
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub calibrated: bool,
    #[serde(default)]
    pub model_path: Option<String>,
}

#[async_trait]
pub trait FrameQualityOracle: Send + Sync {
    async fn check_frame(&self, frame: &EncodedFrame) -> Result<FrameQuality, BackendError>;
}

#[async_trait]
pub trait CalibrationFitter: Send + Sync {
    async fn submit_calibration(
        &self,
        request: &CalibrationRequest,
    ) -> Result<CalibrationVerdict, BackendError>;
}

#[async_trait]
pub trait GazePredictor: Send + Sync {
    async fn predict_gaze(&self, frame: &EncodedFrame) -> Result<GazePrediction, BackendError>;
}

#[async_trait]
pub trait LayoutProvider: Send + Sync {
    async fn calibration_layout(
        &self,
        screen: Viewport,
    ) -> Result<Vec<CalibrationTarget>, BackendError>;
}

/// Everything a session needs from the remote side.
pub trait GazeBackend: FrameQualityOracle + CalibrationFitter + GazePredictor + LayoutProvider {}

impl<T> GazeBackend for T where
    T: FrameQualityOracle + CalibrationFitter + GazePredictor + LayoutProvider
{
}
