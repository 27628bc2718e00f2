//! Error types for VisionBridge

/// Result type alias using VisionBridge's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Message reported for every model load failure
pub const INVALID_MODEL: &str = "Invalid model";

/// Core error type for VisionBridge operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or malformed command arguments
    #[error("invalid arguments for {command}: {message}")]
    InvalidArguments { command: String, message: String },

    /// Model descriptor rejected or backend construction failed
    #[error("predictor error: {0}")]
    Predictor(String),

    /// Operation needs an installed backend but none is active
    #[error("no active inference backend")]
    NoActiveBackend,

    /// No frame has been captured yet
    #[error("no frame available")]
    FrameUnavailable,

    /// Snapshot compression failed
    #[error("encode failure: {0}")]
    EncodeFailure(String),

    /// Image could not be read or decoded
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Model evaluation failed
    #[error("inference error: {0}")]
    Inference(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a new invalid-arguments error for a command
    pub fn invalid_arguments(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create the uniform model load failure
    pub fn predictor() -> Self {
        Self::Predictor(INVALID_MODEL.to_string())
    }

    /// Create a new encode failure
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::EncodeFailure(msg.into())
    }

    /// Create a new invalid image error
    pub fn invalid_image(msg: impl Into<String>) -> Self {
        Self::InvalidImage(msg.into())
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stable code reported to hosts alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArguments { .. } => "InvalidArguments",
            Self::Predictor(_) => "PredictorError",
            Self::NoActiveBackend => "NoActiveBackend",
            Self::FrameUnavailable => "FrameUnavailable",
            Self::EncodeFailure(_) => "EncodeFailure",
            Self::InvalidImage(_) => "InvalidImage",
            Self::Inference(_) => "InferenceError",
            Self::Config(_) => "ConfigError",
            Self::Io(_) => "IoError",
            Self::Serialization(_) => "SerializationError",
        }
    }

    /// Human-readable message without the code prefix
    pub fn message(&self) -> String {
        match self {
            Self::InvalidArguments { message, .. } => message.clone(),
            Self::Predictor(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
