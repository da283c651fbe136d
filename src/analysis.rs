//! Social Preference Index over a finished gaze stream.
//!
//! `SPI = (social - geometric) / total`. This is a screening signal only.

use serde::Serialize;

use crate::types::GazeDataPoint;

const LOW_RISK_FLOOR: f64 = 0.2;
const MEDIUM_RISK_FLOOR: f64 = 0.0;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AnalysisError {
    #[error("no gaze data recorded")]
    NoGazeData,
    #[error("invalid stimulus duration: {0}s")]
    InvalidDuration(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl RiskCategory {
    pub fn from_spi(spi: f64) -> Self {
        if spi >= LOW_RISK_FLOOR {
            Self::Low
        } else if spi >= MEDIUM_RISK_FLOOR {
            Self::Medium
        } else {
            Self::High
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GazeAnalysis {
    pub spi: f64,
    pub social_frames: usize,
    pub geometric_frames: usize,
    pub total_valid_frames: usize,
    pub risk_category: RiskCategory,
    pub interpretation: String,
    pub recommendation: String,
}

pub fn analyze(points: &[GazeDataPoint], video_duration_secs: f64) -> Result<GazeAnalysis, AnalysisError> {
    if points.is_empty() {
        return Err(AnalysisError::NoGazeData);
    }
    if video_duration_secs.is_nan() || video_duration_secs <= 0.0 {
        return Err(AnalysisError::InvalidDuration(video_duration_secs));
    }

    let social_frames = points.iter().filter(|p| p.social_region).count();
    let total_valid_frames = points.len();
    let geometric_frames = total_valid_frames - social_frames;
    let spi = (social_frames as f64 - geometric_frames as f64) / total_valid_frames as f64;
    let risk_category = RiskCategory::from_spi(spi);

    let (interpretation, recommendation) = match risk_category {
        RiskCategory::Low => (
            format!(
                "SPI of {spi:.2} indicates a strong preference for social stimuli, which is typical in neurotypical development. This is a screening signal only and not a diagnostic tool."
            ),
            "Continue monitoring your child's development. If other concerns arise, consult a healthcare professional.",
        ),
        RiskCategory::Medium => (
            format!(
                "SPI of {spi:.2} indicates a mixed preference between social and geometric stimuli. This is a screening signal only and not a diagnostic tool."
            ),
            "Consider discussing this result along with other screening findings with a healthcare professional.",
        ),
        RiskCategory::High => (
            format!(
                "SPI of {spi:.2} indicates a preference for geometric over social stimuli, which may be associated with autism traits. This is a screening signal only and not a diagnostic tool."
            ),
            "This result, combined with other screening findings, suggests consulting with a healthcare professional for comprehensive evaluation.",
        ),
    };

    Ok(GazeAnalysis {
        spi,
        social_frames,
        geometric_frames,
        total_valid_frames,
        risk_category,
        interpretation,
        recommendation: recommendation.to_string(),
    })
}
