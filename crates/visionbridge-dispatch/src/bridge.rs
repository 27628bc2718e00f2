//! Wiring of the dispatcher components

use crate::broadcaster::EventStreams;
use crate::config::DispatchConfig;
use crate::frame_loop::FrameDispatcher;
use crate::lifecycle::ModelLifecycleManager;
use crate::router::CommandRouter;
use crate::slot::BackendSlot;
use crate::snapshot::SnapshotEncoder;
use std::sync::Arc;
use visionbridge_core::{FrameSource, ModelLoader, Result};

/// One dispatcher instance: command router, frame callback and event streams
/// sharing a single backend slot
#[derive(Clone)]
pub struct VisionBridge {
    slot: Arc<BackendSlot>,
    streams: Arc<EventStreams>,
    dispatcher: Arc<FrameDispatcher>,
    router: Arc<CommandRouter>,
}

impl VisionBridge {
    pub fn new(
        config: DispatchConfig,
        loader: Arc<dyn ModelLoader>,
        source: Arc<dyn FrameSource>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let slot = Arc::new(BackendSlot::new());
        let streams = Arc::new(EventStreams::new(config.stream_capacity));
        let dispatcher = Arc::new(FrameDispatcher::new(
            Arc::clone(&slot),
            Arc::clone(&streams),
            &config,
        ));
        let lifecycle = Arc::new(ModelLifecycleManager::new(
            Arc::clone(&slot),
            loader,
            Arc::clone(&config),
        ));
        let snapshots = Arc::new(SnapshotEncoder::new(
            Arc::clone(&source),
            Arc::clone(&slot),
            config.jpeg_quality,
        ));
        let router = Arc::new(CommandRouter::new(
            lifecycle,
            Arc::clone(&dispatcher),
            snapshots,
            Arc::clone(&slot),
            source,
        ));

        Ok(Self {
            slot,
            streams,
            dispatcher,
            router,
        })
    }

    pub fn router(&self) -> &Arc<CommandRouter> {
        &self.router
    }

    /// Frame callback to register with the frame source
    pub fn dispatcher(&self) -> &Arc<FrameDispatcher> {
        &self.dispatcher
    }

    pub fn streams(&self) -> &Arc<EventStreams> {
        &self.streams
    }

    pub fn slot(&self) -> &Arc<BackendSlot> {
        &self.slot
    }
}
