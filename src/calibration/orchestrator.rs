use std::sync::Arc;

use crate::calibration::layout::point_index_for;
use crate::calibration::sampler::{CalibrationSampler, SamplerError, TargetReport};
use crate::capture::FrameSurface;
use crate::services::gaze_backend::{
    BackendError, CalibrationFitter, CalibrationFrame, CalibrationRequest, CalibrationVerdict,
};
use crate::types::{CalibrationTarget, Viewport};

#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("calibration layout has no targets")]
    NoTargets,
    #[error(transparent)]
    Sampler(#[from] SamplerError),
    #[error("calibration rejected by gaze service: {status}")]
    Rejected {
        status: String,
        message: Option<String>,
    },
    #[error("calibration submission failed: {0}")]
    Transport(#[from] BackendError),
}

/// Every target's accepted samples, in layout order.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationBatch {
    pub reports: Vec<TargetReport>,
}

impl CalibrationBatch {
    pub fn sample_count(&self) -> usize {
        self.reports.iter().map(|r| r.samples.len()).sum()
    }

    pub fn into_request(self, layout: &[CalibrationTarget], screen: Viewport) -> CalibrationRequest {
        let frames = self
            .reports
            .into_iter()
            .flat_map(|r| r.samples)
            .enumerate()
            .map(|(ordinal, sample)| CalibrationFrame {
                point_index: point_index_for(layout, sample.target_x, sample.target_y, ordinal),
                frame: sample.frame,
                target_x: sample.target_x,
                target_y: sample.target_y,
            })
            .collect();

        CalibrationRequest {
            frames,
            screen_width: screen.width,
            screen_height: screen.height,
        }
    }
}

/// Drives the sampler over every target in order, then submits the batch.
pub struct CalibrationOrchestrator {
    sampler: CalibrationSampler,
    fitter: Arc<dyn CalibrationFitter>,
}

impl CalibrationOrchestrator {
    pub fn new(sampler: CalibrationSampler, fitter: Arc<dyn CalibrationFitter>) -> Self {
        Self { sampler, fitter }
    }

    pub async fn collect(
        &mut self,
        targets: &[CalibrationTarget],
        surface: &FrameSurface,
    ) -> Result<CalibrationBatch, CalibrationError> {
        if targets.is_empty() {
            return Err(CalibrationError::NoTargets);
        }

        let mut reports = Vec::with_capacity(targets.len());
        for (index, target) in targets.iter().copied().enumerate() {
            let report = self.sampler.collect_target(index, target, surface).await?;
            reports.push(report);
        }
        Ok(CalibrationBatch { reports })
    }

    pub async fn submit(
        &self,
        batch: CalibrationBatch,
        layout: &[CalibrationTarget],
        screen: Viewport,
    ) -> Result<CalibrationVerdict, CalibrationError> {
        let request = batch.into_request(layout, screen);
        let verdict = self.fitter.submit_calibration(&request).await?;
        if !verdict.is_calibrated() {
            tracing::warn!(status = %verdict.status, "Gaze service rejected calibration");
            return Err(CalibrationError::Rejected {
                status: verdict.status,
                message: verdict.message,
            });
        }
        tracing::info!(frames = request.frames.len(), "Calibration accepted");
        Ok(verdict)
    }

    /// Full calibration pass from target 0.
    pub async fn calibrate(
        &mut self,
        targets: &[CalibrationTarget],
        surface: &FrameSurface,
        screen: Viewport,
    ) -> Result<CalibrationVerdict, CalibrationError> {
        let batch = self.collect(targets, surface).await?;
        tracing::info!(
            targets = batch.reports.len(),
            samples = batch.sample_count(),
            "Calibration frames collected"
        );
        self.submit(batch, targets, screen).await
    }
}
