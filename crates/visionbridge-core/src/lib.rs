//! VisionBridge Core
//!
//! Core types and collaborator contracts shared across VisionBridge components.
//!
//! This crate provides:
//! - Frame, detection and inference result types
//! - Model descriptors parsed from host command arguments
//! - Error types and result handling
//! - The narrow traits the dispatcher uses to reach its external collaborators
//!   (model evaluation, model loading, frame capture)

pub mod error;
pub mod model;
pub mod ports;
pub mod types;

pub use error::{Error, Result};
pub use model::{ModelDescriptor, ModelSource, ModelTask};
pub use ports::{FrameListener, FrameSource, InferenceModel, LensDirection, ModelLoader};
pub use types::{BoundingBox, Detection, Frame, InferenceResult, PixelFormat};

