//! Host command dispatch

use crate::frame_loop::FrameDispatcher;
use crate::lifecycle::ModelLifecycleManager;
use crate::slot::BackendSlot;
use crate::snapshot::SnapshotEncoder;
use crate::thresholds::ThresholdConfigurator;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use visionbridge_core::{
    Detection, Error, FrameSource, LensDirection, ModelDescriptor, Result,
};

/// Commands understood by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    LoadModel,
    SetConfidenceThreshold,
    SetIouThreshold,
    SetNumItemsThreshold,
    SetLensDirection,
    SetZoomRatio,
    CloseCamera,
    DetectImage,
    ClassifyImage,
    CaptureOutput,
    TakeSnapshot,
}

impl Command {
    pub const ALL: [Command; 11] = [
        Self::LoadModel,
        Self::SetConfidenceThreshold,
        Self::SetIouThreshold,
        Self::SetNumItemsThreshold,
        Self::SetLensDirection,
        Self::SetZoomRatio,
        Self::CloseCamera,
        Self::DetectImage,
        Self::ClassifyImage,
        Self::CaptureOutput,
        Self::TakeSnapshot,
    ];

    /// Look up a command by its wire name
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::LoadModel => "loadModel",
            Self::SetConfidenceThreshold => "setConfidenceThreshold",
            Self::SetIouThreshold => "setIouThreshold",
            Self::SetNumItemsThreshold => "setNumItemsThreshold",
            Self::SetLensDirection => "setLensDirection",
            Self::SetZoomRatio => "setZoomRatio",
            Self::CloseCamera => "closeCamera",
            Self::DetectImage => "detectImage",
            Self::ClassifyImage => "classifyImage",
            Self::CaptureOutput => "captureOutput",
            Self::TakeSnapshot => "takeSnapshot",
        }
    }
}

/// Successful command result
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResponse {
    /// Model installed
    Success,
    /// Fire-and-forget command accepted
    Ack,
    /// Recognitions for a still image
    Recognitions(Vec<Detection>),
    /// JSON document encoded as text
    Encoded(String),
}

impl CommandResponse {
    /// Value sent back over the response channel
    pub fn to_value(&self) -> Value {
        match self {
            Self::Success => Value::String("Success".to_string()),
            Self::Ack => Value::Null,
            Self::Recognitions(detections) => json!(detections),
            Self::Encoded(text) => Value::String(text.clone()),
        }
    }
}

/// Structured failure payload for the response channel
///
/// Argument errors name the rejected command in `details`.
pub fn error_value(err: &Error) -> Value {
    let details = match err {
        Error::InvalidArguments { command, .. } => json!({ "command": command }),
        _ => Value::Null,
    };
    json!({
        "code": err.code(),
        "message": err.message(),
        "details": details,
    })
}

/// Maps command names to their handlers
pub struct CommandRouter {
    lifecycle: Arc<ModelLifecycleManager>,
    thresholds: ThresholdConfigurator,
    dispatcher: Arc<FrameDispatcher>,
    snapshots: Arc<SnapshotEncoder>,
    slot: Arc<BackendSlot>,
    source: Arc<dyn FrameSource>,
}

impl CommandRouter {
    pub fn new(
        lifecycle: Arc<ModelLifecycleManager>,
        dispatcher: Arc<FrameDispatcher>,
        snapshots: Arc<SnapshotEncoder>,
        slot: Arc<BackendSlot>,
        source: Arc<dyn FrameSource>,
    ) -> Self {
        Self {
            lifecycle,
            thresholds: ThresholdConfigurator::new(Arc::clone(&slot)),
            dispatcher,
            snapshots,
            slot,
            source,
        }
    }

    /// Handle one command
    ///
    /// Returns `None` for unrecognized names so newer hosts can talk to
    /// older dispatchers.
    pub async fn handle(&self, name: &str, args: &Value) -> Option<Result<CommandResponse>> {
        let Some(command) = Command::parse(name) else {
            debug!("Ignoring unknown command '{}'", name);
            return None;
        };
        Some(self.execute(command, args).await)
    }

    /// Run a known command
    pub async fn execute(&self, command: Command, args: &Value) -> Result<CommandResponse> {
        let name = command.name();
        match command {
            Command::LoadModel => self.load_model(args).await,
            Command::SetConfidenceThreshold => {
                let confidence = require_f64(name, args, "confidence")?;
                self.thresholds.set_confidence(confidence);
                Ok(CommandResponse::Ack)
            }
            Command::SetIouThreshold => {
                let iou = require_f64(name, args, "iou")?;
                self.thresholds.set_overlap_threshold(iou);
                Ok(CommandResponse::Ack)
            }
            Command::SetNumItemsThreshold => {
                let num_items = require_i64(name, args, "numItems")?;
                self.thresholds.set_max_items(num_items);
                Ok(CommandResponse::Ack)
            }
            Command::SetLensDirection => {
                let direction = args.get("direction").and_then(Value::as_i64).map(LensDirection::from_code);
                debug!("Lens direction {:?} requested, not applied", direction);
                Ok(CommandResponse::Ack)
            }
            Command::SetZoomRatio => {
                let ratio = require_f64(name, args, "ratio")?;
                if !(ratio.is_finite() && ratio > 0.0) {
                    return Err(Error::invalid_arguments(name, "'ratio' must be a positive number"));
                }
                self.source.set_zoom_ratio(ratio)?;
                Ok(CommandResponse::Ack)
            }
            Command::CloseCamera => {
                self.dispatcher.stop();
                self.source.stop();
                info!("Camera closed");
                Ok(CommandResponse::Ack)
            }
            Command::DetectImage | Command::ClassifyImage => {
                let path = PathBuf::from(require_str(name, args, "imagePath")?);
                self.predict_on_image(path).await
            }
            Command::CaptureOutput => {
                let encoder = Arc::clone(&self.snapshots);
                let output = blocking(move || encoder.capture_and_infer()).await?;
                Ok(CommandResponse::Encoded(serde_json::to_string(&output)?))
            }
            Command::TakeSnapshot => {
                let encoder = Arc::clone(&self.snapshots);
                let snapshot = blocking(move || encoder.snapshot()).await?;
                Ok(CommandResponse::Encoded(serde_json::to_string(&snapshot)?))
            }
        }
    }

    async fn load_model(&self, args: &Value) -> Result<CommandResponse> {
        let descriptor = ModelDescriptor::from_args(args).map_err(|e| {
            warn!("Rejected model descriptor: {}", args);
            e
        })?;

        match self.lifecycle.spawn_load(descriptor).await {
            Ok(Ok(())) => Ok(CommandResponse::Success),
            Ok(Err(e)) => Err(e),
            Err(e) => {
                warn!("Model load task failed: {}", e);
                Err(Error::predictor())
            }
        }
    }

    async fn predict_on_image(&self, path: PathBuf) -> Result<CommandResponse> {
        let backend = self.slot.load().ok_or(Error::NoActiveBackend)?;
        let detections = blocking(move || {
            let image = image::open(&path)
                .map_err(|e| Error::invalid_image(format!("{}: {}", path.display(), e)))?
                .to_rgb8();
            backend.predict_image(&image)
        })
        .await?;
        Ok(CommandResponse::Recognitions(detections))
    }
}

/// Run CPU-bound image work off the async workers
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::inference(format!("worker task failed: {}", e)))?
}

fn require<'a>(command: &str, args: &'a Value, key: &str) -> Result<&'a Value> {
    args.get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| Error::invalid_arguments(command, format!("missing '{}'", key)))
}

fn require_f64(command: &str, args: &Value, key: &str) -> Result<f64> {
    require(command, args, key)?
        .as_f64()
        .ok_or_else(|| Error::invalid_arguments(command, format!("'{}' must be a number", key)))
}

fn require_i64(command: &str, args: &Value, key: &str) -> Result<i64> {
    require(command, args, key)?
        .as_i64()
        .ok_or_else(|| Error::invalid_arguments(command, format!("'{}' must be an integer", key)))
}

fn require_str<'a>(command: &str, args: &'a Value, key: &str) -> Result<&'a str> {
    require(command, args, key)?
        .as_str()
        .ok_or_else(|| Error::invalid_arguments(command, format!("'{}' must be a string", key)))
}
