//! Runtime threshold tuning for the active backend

use crate::backend::Thresholds;
use crate::slot::BackendSlot;
use std::sync::Arc;
use tracing::debug;

/// Applies threshold changes to the active backend when it supports them
///
/// With no backend installed, or a backend without thresholds, every call
/// is a silent no-op.
pub struct ThresholdConfigurator {
    slot: Arc<BackendSlot>,
}

impl ThresholdConfigurator {
    pub fn new(slot: Arc<BackendSlot>) -> Self {
        Self { slot }
    }

    pub fn set_confidence(&self, value: f64) -> bool {
        self.apply("confidence", value, |t| t.set_confidence(value))
    }

    pub fn set_overlap_threshold(&self, value: f64) -> bool {
        self.apply("iou", value, |t| t.set_iou(value))
    }

    pub fn set_max_items(&self, value: i64) -> bool {
        self.apply("num_items", value, |t| t.set_num_items(value))
    }

    /// Returns whether a backend took the change
    fn apply<V: std::fmt::Display>(
        &self,
        name: &str,
        value: V,
        set: impl FnOnce(&Thresholds),
    ) -> bool {
        let Some(backend) = self.slot.load() else {
            debug!("No backend loaded, ignoring {} = {}", name, value);
            return false;
        };
        match backend.thresholds() {
            Some(thresholds) => {
                set(thresholds);
                debug!(model = backend.name(), "Set {} threshold to {}", name, value);
                true
            }
            None => {
                debug!(model = backend.name(), "Backend has no thresholds, ignoring {}", name);
                false
            }
        }
    }
}
