use metrics_exporter_prometheus::PrometheusHandle;
use std::time::Instant;
use visionbridge_dispatch::VisionBridge;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Command router, frame dispatcher and event streams
    pub bridge: VisionBridge,

    /// Prometheus metrics handle for rendering
    pub metrics_handle: PrometheusHandle,

    /// Server start time, reported by the health check
    pub started_at: Instant,
}

impl AppState {
    pub fn new(bridge: VisionBridge, metrics_handle: PrometheusHandle) -> Self {
        Self {
            bridge,
            metrics_handle,
            started_at: Instant::now(),
        }
    }
}
