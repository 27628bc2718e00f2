//! Frame snapshots encoded for text transports

use crate::slot::BackendSlot;
use base64::{prelude::BASE64_STANDARD, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use visionbridge_core::{Detection, Error, FrameSource, Result};

/// Latest frame as base64 JPEG
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub base64_encoded: String,
    pub width: u32,
    pub height: u32,
}

/// Latest frame plus a one-shot inference over it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedOutput {
    pub detected_objects: Vec<Detection>,
    pub base64_encoded: String,
    pub width: u32,
    pub height: u32,
}

/// Captures the most recent frame and encodes it at a fixed JPEG quality
pub struct SnapshotEncoder {
    source: Arc<dyn FrameSource>,
    slot: Arc<BackendSlot>,
    quality: u8,
}

impl SnapshotEncoder {
    pub fn new(source: Arc<dyn FrameSource>, slot: Arc<BackendSlot>, quality: u8) -> Self {
        Self {
            source,
            slot,
            quality: quality.clamp(1, 100),
        }
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        let image = self.capture()?;
        let (width, height) = image.dimensions();
        Ok(Snapshot {
            base64_encoded: self.encode(&image)?,
            width,
            height,
        })
    }

    /// Snapshot plus detections from the active backend
    ///
    /// Fails with [`Error::NoActiveBackend`] before touching the frame
    /// when no backend is installed.
    pub fn capture_and_infer(&self) -> Result<CapturedOutput> {
        let backend = self.slot.load().ok_or(Error::NoActiveBackend)?;
        let image = self.capture()?;
        let detected_objects = backend.predict_image(&image)?;
        let (width, height) = image.dimensions();

        Ok(CapturedOutput {
            detected_objects,
            base64_encoded: self.encode(&image)?,
            width,
            height,
        })
    }

    fn capture(&self) -> Result<RgbImage> {
        let frame = self.source.latest_frame().ok_or(Error::FrameUnavailable)?;
        frame.to_rgb_image().map_err(|e| Error::encode(e.message()))
    }

    fn encode(&self, image: &RgbImage) -> Result<String> {
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode_image(image)
            .map_err(|e| Error::encode(format!("JPEG encode failed: {}", e)))?;
        Ok(BASE64_STANDARD.encode(jpeg))
    }
}
