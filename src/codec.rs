//! Frame codec: samples the current surface frame into a transmittable
//! JPEG/base64 still.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;

use crate::capture::{FrameSurface, RawFrame};
use crate::constants::DEFAULT_JPEG_QUALITY;
use crate::types::EncodedFrame;

#[derive(Debug)]
pub struct FrameCodec {
    quality: u8,
    scratch: Vec<u8>,
}

impl FrameCodec {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            scratch: Vec::new(),
        }
    }

    /// Encodes whatever the surface currently shows. `None` means "skip this tick".
    pub fn encode(&mut self, surface: &FrameSurface) -> Option<EncodedFrame> {
        let frame = surface.current_frame()?;
        self.encode_raw(&frame)
    }

    pub fn encode_raw(&mut self, frame: &RawFrame) -> Option<EncodedFrame> {
        if !frame.is_complete() {
            return None;
        }
        let len = frame.width as usize * frame.height as usize * 3;

        self.scratch.clear();
        let result = {
            let mut encoder = JpegEncoder::new_with_quality(&mut self.scratch, self.quality);
            encoder.encode(
                &frame.pixels[..len],
                frame.width,
                frame.height,
                ColorType::Rgb8,
            )
        };
        if let Err(e) = result {
            tracing::debug!(error = %e, "Frame encoding failed");
            return None;
        }

        Some(EncodedFrame::new(BASE64.encode(&self.scratch)))
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}
