//! VisionBridge Dispatch
//!
//! Bridges host commands and a live camera feed to a swappable inference backend.
//!
//! Two domains meet here:
//! - the command domain ([`CommandRouter`]): model loading, threshold tuning,
//!   snapshots and still-image inference, one call at a time
//! - the frame domain ([`FrameDispatcher`]): invoked per captured frame by the
//!   capture thread, runs the active backend and fans results out to three
//!   single-subscriber [`StreamBroadcaster`]s
//!
//! They share only the [`BackendSlot`] and the streams. Neither side blocks
//! the other: backend replacement is a pointer swap and stream delivery
//! drops values instead of waiting.

pub mod backend;
pub mod bridge;
pub mod broadcaster;
pub mod config;
pub mod frame_loop;
pub mod lifecycle;
pub mod metrics;
pub mod router;
pub mod slot;
pub mod snapshot;
pub mod thresholds;

pub use backend::{Backend, ObjectClassifier, ObjectDetector, ThresholdValues, Thresholds};
pub use bridge::VisionBridge;
pub use broadcaster::{EventStreams, StreamBroadcaster, StreamKind, Subscription};
pub use config::{DispatchConfig, ThresholdDefaults};
pub use frame_loop::{DispatchOutcome, FrameDispatcher};
pub use lifecycle::ModelLifecycleManager;
pub use router::{error_value, Command, CommandResponse, CommandRouter};
pub use slot::BackendSlot;
pub use snapshot::{CapturedOutput, Snapshot, SnapshotEncoder};
pub use thresholds::ThresholdConfigurator;
