use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::types::Viewport;

#[derive(Debug, thiserror::Error)]
pub enum PresentationError {
    #[error("fullscreen request rejected: {0}")]
    Rejected(String),
    #[error("fullscreen not supported")]
    Unsupported,
}

/// Full-viewport presentation surface owned by the session.
#[async_trait]
pub trait Presentation: Send + Sync {
    async fn enter_fullscreen(&self) -> Result<(), PresentationError>;

    /// Best effort; never fails.
    fn exit_fullscreen(&self);

    /// Surface that stimulus and gaze points are mapped onto.
    fn viewport(&self) -> Viewport;

    /// Physical screen, used for layout requests and calibration submission.
    fn screen(&self) -> Viewport {
        self.viewport()
    }
}

/// Presentation for hosts without a display of their own: the surface
/// dimensions come from configuration and fullscreen is only tracked.
#[derive(Debug)]
pub struct HeadlessPresentation {
    viewport: Viewport,
    fullscreen: AtomicBool,
}

impl HeadlessPresentation {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            fullscreen: AtomicBool::new(false),
        }
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Presentation for HeadlessPresentation {
    async fn enter_fullscreen(&self) -> Result<(), PresentationError> {
        self.fullscreen.store(true, Ordering::SeqCst);
        tracing::debug!(
            width = self.viewport.width,
            height = self.viewport.height,
            "Presentation entered fullscreen"
        );
        Ok(())
    }

    fn exit_fullscreen(&self) {
        if self.fullscreen.swap(false, Ordering::SeqCst) {
            tracing::debug!("Presentation left fullscreen");
        }
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }
}
