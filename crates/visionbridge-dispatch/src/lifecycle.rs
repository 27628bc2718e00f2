//! Model loading and backend installation

use crate::backend::Backend;
use crate::config::DispatchConfig;
use crate::metrics as m;
use crate::slot::BackendSlot;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use visionbridge_core::{Error, ModelDescriptor, ModelLoader, ModelSource, Result};

/// Validates model descriptors, builds backends and installs them
///
/// Loads are serialized in arrival order, so when several are issued
/// back-to-back the last one issued is the one left installed.
pub struct ModelLifecycleManager {
    slot: Arc<BackendSlot>,
    loader: Arc<dyn ModelLoader>,
    config: Arc<DispatchConfig>,
    load_lock: Mutex<()>,
}

impl ModelLifecycleManager {
    pub fn new(slot: Arc<BackendSlot>, loader: Arc<dyn ModelLoader>, config: Arc<DispatchConfig>) -> Self {
        Self {
            slot,
            loader,
            config,
            load_lock: Mutex::new(()),
        }
    }

    /// Start loading on a background task
    ///
    /// The handle resolves once the backend is installed or the load failed.
    pub fn spawn_load(self: &Arc<Self>, descriptor: ModelDescriptor) -> JoinHandle<Result<()>> {
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.load_model(descriptor).await })
    }

    /// Load a model and install it as the active backend
    ///
    /// Every failure is reported as the same [`Error::Predictor`]; the
    /// previously active backend stays installed.
    pub async fn load_model(&self, descriptor: ModelDescriptor) -> Result<()> {
        let _turn = self.load_lock.lock().await;

        let result = self.build(&descriptor).await;
        m::model_load(result.is_ok());

        let backend = result?;
        info!(model = backend.name(), task = backend.task().as_str(), "Installing backend");
        if let Some(previous) = self.slot.install(backend) {
            info!(model = previous.name(), "Previous backend discarded");
        }
        Ok(())
    }

    async fn build(&self, descriptor: &ModelDescriptor) -> Result<Backend> {
        let path = match &descriptor.source {
            ModelSource::Local(path) => path,
            ModelSource::Remote => {
                warn!("Remote models are not supported");
                return Err(Error::predictor());
            }
        };

        info!("Loading {} model from {}", descriptor.task.as_str(), path.display());
        let model = self.loader.load(path, descriptor.task).await.map_err(|e| {
            warn!("Failed to load model {}: {}", path.display(), e);
            Error::predictor()
        })?;

        Ok(Backend::new(descriptor.task, model, &self.config))
    }
}
