use crate::constants::{FALLBACK_POINT_CHUNK, TARGET_MATCH_TOLERANCE};
use crate::services::gaze_backend::LayoutProvider;
use crate::types::{CalibrationTarget, Viewport};

/// Built-in 9-point layout: center, corners, then edge midpoints.
pub const DEFAULT_LAYOUT: [CalibrationTarget; 9] = [
    CalibrationTarget::new(0.5, 0.5),
    CalibrationTarget::new(0.1, 0.1),
    CalibrationTarget::new(0.9, 0.1),
    CalibrationTarget::new(0.1, 0.9),
    CalibrationTarget::new(0.9, 0.9),
    CalibrationTarget::new(0.5, 0.1),
    CalibrationTarget::new(0.1, 0.5),
    CalibrationTarget::new(0.9, 0.5),
    CalibrationTarget::new(0.5, 0.9),
];

/// Asks the provider for the layout of `screen`, falling back to
/// [`DEFAULT_LAYOUT`] when the request fails or the answer is unusable.
pub async fn resolve_layout(provider: &dyn LayoutProvider, screen: Viewport) -> Vec<CalibrationTarget> {
    match provider.calibration_layout(screen).await {
        Ok(points) if !points.is_empty() && points.iter().all(CalibrationTarget::is_normalized) => {
            tracing::info!(targets = points.len(), "Using calibration layout from gaze service");
            points
        }
        Ok(points) => {
            tracing::warn!(targets = points.len(), "Calibration layout unusable, using built-in layout");
            DEFAULT_LAYOUT.to_vec()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Calibration layout request failed, using built-in layout");
            DEFAULT_LAYOUT.to_vec()
        }
    }
}

/// Index of the first layout target within tolerance of `(x, y)`; samples
/// matching none are bucketed by their position in the batch.
pub fn point_index_for(layout: &[CalibrationTarget], x: f64, y: f64, ordinal: usize) -> usize {
    layout
        .iter()
        .position(|t| t.matches(x, y, TARGET_MATCH_TOLERANCE))
        .unwrap_or(ordinal / FALLBACK_POINT_CHUNK)
}
