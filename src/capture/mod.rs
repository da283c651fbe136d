//! Camera capture: the persistent hidden frame surface and the device seam
//! that feeds it.

pub mod snapshot;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::constants::{IDEAL_CAPTURE_HEIGHT, IDEAL_CAPTURE_WIDTH};

/// Decoded RGB8 frame as delivered by a capture stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Whether the pixel buffer covers the declared dimensions.
    pub fn is_complete(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len() >= self.width as usize * self.height as usize * 3
    }
}

/// Video-only, user-facing capture request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            ideal_width: IDEAL_CAPTURE_WIDTH,
            ideal_height: IDEAL_CAPTURE_HEIGHT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("no camera device available: {0}")]
    NoDevice(String),
    #[error("camera did not become ready within {0:?}")]
    CaptureTimeout(Duration),
}

#[derive(Default)]
struct Slot {
    generation: u64,
    frame: Option<Arc<RawFrame>>,
}

struct SurfaceInner {
    slot: RwLock<Slot>,
    ready: watch::Sender<bool>,
}

impl SurfaceInner {
    fn store(&self, generation: Option<u64>, frame: RawFrame) -> bool {
        let complete = frame.is_complete();
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        if generation.is_some_and(|g| g != slot.generation) {
            return false;
        }
        slot.frame = Some(Arc::new(frame));
        // Readiness flips under the slot lock so `clear` cannot interleave.
        if complete {
            self.ready.send_if_modified(|ready| !std::mem::replace(ready, true));
        }
        true
    }
}

/// Hidden surface the camera stream is bound to. Survives phase changes so
/// calibration and tracking read from the same feed.
#[derive(Clone)]
pub struct FrameSurface {
    inner: Arc<SurfaceInner>,
}

impl FrameSurface {
    pub fn new() -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            inner: Arc::new(SurfaceInner {
                slot: RwLock::new(Slot::default()),
                ready,
            }),
        }
    }

    /// Replaces the current frame. The first complete frame marks the surface playable.
    pub fn publish(&self, frame: RawFrame) {
        self.inner.store(None, frame);
    }

    /// Handle for one camera stream. It stops publishing once the surface is cleared.
    pub fn bind(&self) -> SurfaceBinding {
        let generation = self.inner.slot.read().unwrap_or_else(|e| e.into_inner()).generation;
        SurfaceBinding {
            inner: self.inner.clone(),
            generation,
        }
    }

    pub fn current_frame(&self) -> Option<Arc<RawFrame>> {
        self.inner
            .slot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .frame
            .clone()
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.ready.borrow()
    }

    /// Drops the current frame and readiness, and detaches every binding
    /// handed out so far.
    pub fn clear(&self) {
        let mut slot = self.inner.slot.write().unwrap_or_else(|e| e.into_inner());
        slot.generation += 1;
        slot.frame = None;
        self.inner.ready.send_replace(false);
    }

    /// Suspends until the surface can play, bounded by `timeout`.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), CameraError> {
        let mut rx = self.inner.ready.subscribe();
        let result = match tokio::time::timeout(timeout, rx.wait_for(|ready| *ready)).await {
            Ok(Ok(_)) => Ok(()),
            // The sender lives in `self`, so a closed channel cannot occur while we wait.
            Ok(Err(_)) | Err(_) => Err(CameraError::CaptureTimeout(timeout)),
        };
        result
    }
}

impl Default for FrameSurface {
    fn default() -> Self {
        Self::new()
    }
}

/// Publishing end of a [`FrameSurface`] held by one capture stream.
#[derive(Clone)]
pub struct SurfaceBinding {
    inner: Arc<SurfaceInner>,
    generation: u64,
}

impl SurfaceBinding {
    /// Returns `false` once the surface was cleared after this binding was made.
    pub fn publish(&self, frame: RawFrame) -> bool {
        self.inner.store(Some(self.generation), frame)
    }
}

/// A live capture stream bound to a [`FrameSurface`].
pub trait CaptureStream: Send {
    /// Stops every track of the stream. Must be idempotent.
    fn stop(&mut self);

    fn is_live(&self) -> bool;

    fn label(&self) -> String;
}

/// Capture device able to open a video-only stream into a surface.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    async fn open(
        &self,
        constraints: &CaptureConstraints,
        surface: SurfaceBinding,
    ) -> Result<Box<dyn CaptureStream>, CameraError>;
}
