//! Single-slot holder for the active backend

use crate::backend::Backend;
use arc_swap::ArcSwapOption;
use std::sync::Arc;

/// Holds the active backend, if any
///
/// Readers get an `Arc` to whichever backend was installed when they looked,
/// so a replacement never tears a reader and an in-flight inference keeps
/// its backend alive until it returns.
#[derive(Default)]
pub struct BackendSlot {
    active: ArcSwapOption<Backend>,
}

impl BackendSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Current backend
    pub fn load(&self) -> Option<Arc<Backend>> {
        self.active.load_full()
    }

    pub fn is_empty(&self) -> bool {
        self.active.load().is_none()
    }

    /// Install a fully constructed backend, returning the one it replaced
    pub fn install(&self, backend: Backend) -> Option<Arc<Backend>> {
        self.active.swap(Some(Arc::new(backend)))
    }
}

impl std::fmt::Debug for BackendSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSlot")
            .field("active", &self.load())
            .finish()
    }
}
