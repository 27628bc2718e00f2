//! Contracts for the collaborators the dispatcher drives but does not own

use crate::{Detection, Frame, ModelTask, Result};
use async_trait::async_trait;
use image::RgbImage;
use std::path::Path;

/// A loaded model that can evaluate a single image
///
/// Detectors return every candidate they find; confidence filtering,
/// overlap suppression and result limits are applied by the caller.
pub trait InferenceModel: Send + Sync {
    /// Evaluate one image
    fn infer(&self, image: &RgbImage) -> Result<Vec<Detection>>;

    /// Get the model name
    fn name(&self) -> &str;
}

/// Builds models from files; construction may take a while
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Load the model at `path` for the given task
    async fn load(&self, path: &Path, task: ModelTask) -> Result<Box<dyn InferenceModel>>;
}

/// Receives every captured frame, usually on the capture thread
pub trait FrameListener: Send + Sync {
    fn on_frame(&self, frame: &Frame);
}

/// Which camera the frame source should use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LensDirection {
    Back,
    Front,
}

impl LensDirection {
    /// Map the host's integer code (0 = back, anything else = front)
    pub fn from_code(code: i64) -> Self {
        if code == 0 {
            Self::Back
        } else {
            Self::Front
        }
    }
}

/// The capture subsystem that owns the camera
pub trait FrameSource: Send + Sync {
    /// Most recently captured frame, if any
    fn latest_frame(&self) -> Option<Frame>;

    /// Stop capturing; no further frames are delivered
    fn stop(&self);

    /// Adjust optical or digital zoom
    fn set_zoom_ratio(&self, _ratio: f64) -> Result<()> {
        Ok(())
    }
}
