//! Scoped ownership of the session's camera stream and fullscreen state.
//!
//! Both resources are released exactly once per acquisition: on normal
//! completion, on a fatal error, on abort, and finally on drop.

use std::sync::Arc;
use std::time::Duration;

use crate::capture::{CameraDevice, CameraError, CaptureConstraints, CaptureStream, FrameSurface};
use crate::presentation::Presentation;

pub struct SessionResources {
    camera: Arc<dyn CameraDevice>,
    presentation: Arc<dyn Presentation>,
    constraints: CaptureConstraints,
    ready_timeout: Duration,
    surface: FrameSurface,
    stream: Option<Box<dyn CaptureStream>>,
    fullscreen_engaged: bool,
}

impl SessionResources {
    pub fn new(
        camera: Arc<dyn CameraDevice>,
        presentation: Arc<dyn Presentation>,
        constraints: CaptureConstraints,
        ready_timeout: Duration,
    ) -> Self {
        Self {
            camera,
            presentation,
            constraints,
            ready_timeout,
            surface: FrameSurface::new(),
            stream: None,
            fullscreen_engaged: false,
        }
    }

    pub fn surface(&self) -> &FrameSurface {
        &self.surface
    }

    pub fn has_camera(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| s.is_live())
    }

    pub fn is_fullscreen_engaged(&self) -> bool {
        self.fullscreen_engaged
    }

    /// Opens the camera, binds it to the hidden surface and waits until the
    /// surface can play. A previously bound stream is stopped first.
    pub async fn acquire_camera(&mut self) -> Result<(), CameraError> {
        self.release_camera();

        let stream = self
            .camera
            .open(&self.constraints, self.surface.bind())
            .await?;
        tracing::info!(camera = %stream.label(), "Camera stream bound to surface");
        self.stream = Some(stream);

        if let Err(e) = self.surface.wait_ready(self.ready_timeout).await {
            tracing::warn!(error = %e, "Camera surface never became ready");
            self.release_camera();
            return Err(e);
        }
        Ok(())
    }

    /// Stops every track of the bound stream. Safe to call repeatedly.
    pub fn release_camera(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            tracing::info!(camera = %stream.label(), "Camera released");
        }
        self.surface.clear();
    }

    /// Best effort: a refusal is logged and the session continues windowed.
    pub async fn enter_fullscreen(&mut self) -> bool {
        if self.fullscreen_engaged {
            return true;
        }
        self.fullscreen_engaged = true;
        match self.presentation.enter_fullscreen().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Fullscreen request failed, continuing windowed");
                false
            }
        }
    }

    pub fn exit_fullscreen(&mut self) {
        if std::mem::take(&mut self.fullscreen_engaged) {
            self.presentation.exit_fullscreen();
        }
    }

    /// Releases camera and fullscreen. Idempotent.
    pub fn teardown(&mut self) {
        self.release_camera();
        self.exit_fullscreen();
    }
}

impl Drop for SessionResources {
    fn drop(&mut self) {
        self.teardown();
    }
}
