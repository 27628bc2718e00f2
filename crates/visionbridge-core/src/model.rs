//! Model descriptors parsed from host commands

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// What the model does with a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTask {
    /// Object detection with bounding boxes
    Detect,
    /// Whole-image classification
    Classify,
}

impl ModelTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detect => "detect",
            Self::Classify => "classify",
        }
    }
}

/// Where the model weights live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Model file on the local file system
    Local(PathBuf),
    /// Model hosted elsewhere
    Remote,
}

/// Immutable description of a model to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub source: ModelSource,
    pub task: ModelTask,
}

impl ModelDescriptor {
    /// Describe a local model file
    pub fn local(path: impl Into<PathBuf>, task: ModelTask) -> Self {
        Self {
            source: ModelSource::Local(path.into()),
            task,
        }
    }

    /// Parse the `model` object of a `loadModel` command
    ///
    /// Checks run in order: source type, task, then path for local models.
    /// Every failure is the same [`Error::Predictor`].
    pub fn from_args(args: &Value) -> Result<Self> {
        let model = args
            .get("model")
            .and_then(Value::as_object)
            .ok_or_else(Error::predictor)?;

        let kind = model.get("type").and_then(Value::as_str);
        let kind = match kind {
            Some(kind @ ("local" | "remote")) => kind,
            _ => return Err(Error::predictor()),
        };

        let task = match model.get("task").and_then(Value::as_str) {
            Some("detect") => ModelTask::Detect,
            Some("classify") => ModelTask::Classify,
            _ => return Err(Error::predictor()),
        };

        let source = if kind == "local" {
            let path = model
                .get("modelPath")
                .and_then(Value::as_str)
                .filter(|p| !p.is_empty())
                .ok_or_else(Error::predictor)?;
            ModelSource::Local(PathBuf::from(path))
        } else {
            ModelSource::Remote
        };

        Ok(Self { source, task })
    }
}
