//! Core types for VisionBridge

use crate::{Error, Result};
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

/// Layout of the bytes carried by a [`Frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Packed 8-bit RGB, row-major, no padding
    Rgb8,
    /// Packed 8-bit RGBA, row-major, no padding
    Rgba8,
    /// A complete JPEG bitstream (MJPEG cameras)
    Jpeg,
}

/// A single captured video frame
///
/// The pixel buffer is reference counted, so cloning a frame never copies pixels.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonic sequence number assigned by the frame source
    pub sequence: u64,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Buffer layout
    pub format: PixelFormat,

    /// Raw buffer
    pub data: Bytes,
}

impl Frame {
    /// Create a new frame
    pub fn new(sequence: u64, width: u32, height: u32, format: PixelFormat, data: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            width,
            height,
            format,
            data: data.into(),
        }
    }

    /// Wrap an RGB image as a frame
    pub fn from_rgb(sequence: u64, image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(sequence, width, height, PixelFormat::Rgb8, image.into_raw())
    }

    /// Decode the frame into a drawable RGB image
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        match self.format {
            PixelFormat::Rgb8 => RgbImage::from_raw(self.width, self.height, self.data.to_vec())
                .ok_or_else(|| self.size_mismatch(3)),
            PixelFormat::Rgba8 => RgbaImage::from_raw(self.width, self.height, self.data.to_vec())
                .map(|rgba| DynamicImage::ImageRgba8(rgba).to_rgb8())
                .ok_or_else(|| self.size_mismatch(4)),
            PixelFormat::Jpeg => image::load_from_memory_with_format(&self.data, ImageFormat::Jpeg)
                .map(|img| img.to_rgb8())
                .map_err(|e| Error::invalid_image(format!("frame {}: {}", self.sequence, e))),
        }
    }

    fn size_mismatch(&self, channels: usize) -> Error {
        Error::invalid_image(format!(
            "frame {}: {} bytes do not fill {}x{}x{}",
            self.sequence,
            self.data.len(),
            self.width,
            self.height,
            channels
        ))
    }
}

/// Axis-aligned box in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Create a new bounding box
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Box area, zero for degenerate boxes
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Area shared with another box
    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let l = self.x.max(other.x);
        let r = (self.x + self.width).min(other.x + other.width);
        let t = self.y.max(other.y);
        let b = (self.y + self.height).min(other.y + other.height);
        (r - l).max(0.0) * (b - t).max(0.0)
    }

    /// Intersection over union
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let union = self.area() + other.area() - self.intersection_area(other);
        if union <= 0.0 {
            return 0.0;
        }
        self.intersection_area(other) / union
    }
}

/// A single recognition record produced by a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    /// Class label
    pub label: String,

    /// Class index in the model's label table
    pub index: usize,

    /// Confidence score (0.0-1.0)
    pub confidence: f32,

    /// Location, absent for whole-image classifications
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

impl Detection {
    /// Create a localized detection
    pub fn boxed(label: impl Into<String>, index: usize, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            index,
            confidence,
            bbox: Some(bbox),
        }
    }

    /// Create a whole-image classification
    pub fn class(label: impl Into<String>, index: usize, confidence: f32) -> Self {
        Self {
            label: label.into(),
            index,
            confidence,
            bbox: None,
        }
    }
}

/// Output of one frame's inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceResult {
    /// Recognitions, best first
    pub detections: Vec<Detection>,

    /// Wall time of the model call in milliseconds
    pub inference_time_millis: f64,

    /// Smoothed frames per second of the dispatch path
    pub fps_rate: f64,
}
