//! Per-frame inference and stream fan-out

use crate::broadcaster::EventStreams;
use crate::config::DispatchConfig;
use crate::metrics as m;
use crate::slot::BackendSlot;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use visionbridge_core::{Frame, FrameListener};

/// What happened to one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Inference ran and results were offered to the streams
    Dispatched,
    /// The camera was closed
    Stopped,
    /// Not selected by the frame stride
    Skipped,
    /// No backend installed yet
    NoBackend,
    /// Previous frame still in inference
    Busy,
    /// Decoding or inference failed
    Failed,
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dispatched => "dispatched",
            Self::Stopped => "stopped",
            Self::Skipped => "skipped",
            Self::NoBackend => "no_backend",
            Self::Busy => "busy",
            Self::Failed => "failed",
        }
    }
}

/// Frame callback: runs the active backend and pushes its output
///
/// Called from the capture thread. Never waits on model loading or on
/// stream subscribers, and never keeps the frame after returning.
pub struct FrameDispatcher {
    slot: Arc<BackendSlot>,
    streams: Arc<EventStreams>,
    stride: u64,
    drop_while_busy: bool,
    frames_seen: AtomicU64,
    busy: AtomicBool,
    stopped: AtomicBool,
}

impl FrameDispatcher {
    pub fn new(slot: Arc<BackendSlot>, streams: Arc<EventStreams>, config: &DispatchConfig) -> Self {
        Self {
            slot,
            streams,
            stride: u64::from(config.frame_stride.max(1)),
            drop_while_busy: config.drop_frames_while_busy,
            frames_seen: AtomicU64::new(0),
            busy: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    /// Make dispatch permanently inert
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            info!("Frame dispatch stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Process one frame
    pub fn dispatch(&self, frame: &Frame) -> DispatchOutcome {
        let outcome = self.run(frame);
        m::frame(outcome.as_str());
        outcome
    }

    fn run(&self, frame: &Frame) -> DispatchOutcome {
        if self.is_stopped() {
            return DispatchOutcome::Stopped;
        }

        let seen = self.frames_seen.fetch_add(1, Ordering::Relaxed);
        if seen % self.stride != 0 {
            return DispatchOutcome::Skipped;
        }

        let Some(backend) = self.slot.load() else {
            return DispatchOutcome::NoBackend;
        };

        let _guard = if self.drop_while_busy {
            match BusyGuard::acquire(&self.busy) {
                Some(guard) => Some(guard),
                None => {
                    debug!(frame = frame.sequence, "Inference in flight, frame dropped");
                    return DispatchOutcome::Busy;
                }
            }
        } else {
            None
        };

        let image = match frame.to_rgb_image() {
            Ok(image) => image,
            Err(e) => {
                warn!(frame = frame.sequence, "Undecodable frame: {}", e);
                return DispatchOutcome::Failed;
            }
        };

        let result = match backend.run_inference(&image) {
            Ok(result) => result,
            Err(e) => {
                warn!(frame = frame.sequence, model = backend.name(), "Inference failed: {}", e);
                return DispatchOutcome::Failed;
            }
        };
        m::inference_latency(result.inference_time_millis);

        self.streams.predictions.sink(result.detections);
        self.streams.inference_time.sink(result.inference_time_millis);
        self.streams.fps_rate.sink(result.fps_rate);

        DispatchOutcome::Dispatched
    }
}

impl FrameListener for FrameDispatcher {
    fn on_frame(&self, frame: &Frame) {
        self.dispatch(frame);
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
