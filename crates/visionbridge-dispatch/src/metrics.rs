//! Dispatcher metrics
//!
//! Emitted through the `metrics` facade; they are no-ops until the host
//! installs a recorder.

use crate::broadcaster::StreamKind;

pub const FRAMES_TOTAL: &str = "visionbridge_frames_total";
pub const STREAM_VALUES_TOTAL: &str = "visionbridge_stream_values_total";
pub const INFERENCE_LATENCY_MS: &str = "visionbridge_inference_latency_ms";
pub const MODEL_LOADS_TOTAL: &str = "visionbridge_model_loads_total";

/// Register descriptions with the installed recorder
pub fn describe() {
    ::metrics::describe_counter!(FRAMES_TOTAL, "Captured frames by dispatch outcome");
    ::metrics::describe_counter!(
        STREAM_VALUES_TOTAL,
        "Values offered to event streams by stream and delivery outcome"
    );
    ::metrics::describe_histogram!(
        INFERENCE_LATENCY_MS,
        ::metrics::Unit::Milliseconds,
        "Per-frame model evaluation time"
    );
    ::metrics::describe_counter!(MODEL_LOADS_TOTAL, "Model load attempts by result");
}

pub(crate) fn frame(outcome: &'static str) {
    ::metrics::counter!(FRAMES_TOTAL, "outcome" => outcome).increment(1);
}

pub(crate) fn stream_value(kind: StreamKind, delivered: bool) {
    let outcome = if delivered { "delivered" } else { "dropped" };
    ::metrics::counter!(STREAM_VALUES_TOTAL, "stream" => kind.as_str(), "outcome" => outcome)
        .increment(1);
}

pub(crate) fn inference_latency(millis: f64) {
    ::metrics::histogram!(INFERENCE_LATENCY_MS).record(millis);
}

pub(crate) fn model_load(success: bool) {
    let result = if success { "success" } else { "failure" };
    ::metrics::counter!(MODEL_LOADS_TOTAL, "result" => result).increment(1);
}
