//! Dispatcher configuration

use serde::{Deserialize, Serialize};
use visionbridge_core::{Error, Result};

/// Runtime settings for the dispatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// JPEG quality for snapshots (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Values buffered per stream subscriber before new values are dropped
    #[serde(default = "default_stream_capacity")]
    pub stream_capacity: usize,

    /// Run inference on every Nth frame
    #[serde(default = "default_frame_stride")]
    pub frame_stride: u32,

    /// Number of classes reported by classifier backends
    #[serde(default = "default_classify_top_k")]
    pub classify_top_k: usize,

    /// Drop frames that arrive while the previous frame is still in inference
    #[serde(default = "default_true")]
    pub drop_frames_while_busy: bool,

    /// Thresholds a freshly loaded detector starts with
    #[serde(default)]
    pub default_thresholds: ThresholdDefaults,
}

impl DispatchConfig {
    /// Reject settings the dispatcher cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::config(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if self.stream_capacity == 0 {
            return Err(Error::config("stream_capacity must be at least 1"));
        }
        if self.frame_stride == 0 {
            return Err(Error::config("frame_stride must be at least 1"));
        }
        self.default_thresholds.validate()
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
            stream_capacity: default_stream_capacity(),
            frame_stride: default_frame_stride(),
            classify_top_k: default_classify_top_k(),
            drop_frames_while_busy: true,
            default_thresholds: ThresholdDefaults::default(),
        }
    }
}

/// Initial detector thresholds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThresholdDefaults {
    #[serde(default = "default_confidence")]
    pub confidence: f32,

    #[serde(default = "default_iou")]
    pub iou: f32,

    #[serde(default = "default_num_items")]
    pub num_items: usize,
}

impl ThresholdDefaults {
    fn validate(&self) -> Result<()> {
        for (name, value) in [("confidence", self.confidence), ("iou", self.iou)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::config(format!(
                    "default {} threshold must be within 0..=1, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

impl Default for ThresholdDefaults {
    fn default() -> Self {
        Self {
            confidence: default_confidence(),
            iou: default_iou(),
            num_items: default_num_items(),
        }
    }
}

fn default_jpeg_quality() -> u8 {
    50
}

fn default_stream_capacity() -> usize {
    8
}

fn default_frame_stride() -> u32 {
    1
}

fn default_classify_top_k() -> usize {
    5
}

fn default_confidence() -> f32 {
    0.25
}

fn default_iou() -> f32 {
    0.45
}

fn default_num_items() -> usize {
    30
}

fn default_true() -> bool {
    true
}
