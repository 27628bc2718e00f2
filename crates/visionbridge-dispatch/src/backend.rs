//! Inference backends: a loaded model plus the post-processing its task needs

use crate::config::{DispatchConfig, ThresholdDefaults};
use image::RgbImage;
use parking_lot::Mutex;
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Instant;
use visionbridge_core::{Detection, InferenceModel, InferenceResult, ModelTask, Result};

/// Weight of the newest sample in the smoothed fps value
const FPS_SMOOTHING: f64 = 0.1;

/// The active inference backend
///
/// Only detectors expose tunable thresholds; callers ask through
/// [`Backend::thresholds`] instead of inspecting the variant.
pub enum Backend {
    Detector(ObjectDetector),
    Classifier(ObjectClassifier),
}

impl Backend {
    /// Wrap a freshly loaded model for its task
    pub fn new(task: ModelTask, model: Box<dyn InferenceModel>, config: &DispatchConfig) -> Self {
        match task {
            ModelTask::Detect => Self::Detector(ObjectDetector::new(model, config.default_thresholds)),
            ModelTask::Classify => Self::Classifier(ObjectClassifier::new(model, config.classify_top_k)),
        }
    }

    pub fn task(&self) -> ModelTask {
        match self {
            Self::Detector(_) => ModelTask::Detect,
            Self::Classifier(_) => ModelTask::Classify,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Detector(d) => d.model.name(),
            Self::Classifier(c) => c.model.name(),
        }
    }

    pub fn supports_tuning(&self) -> bool {
        self.thresholds().is_some()
    }

    /// Tunable thresholds, if this backend has any
    pub fn thresholds(&self) -> Option<&Thresholds> {
        match self {
            Self::Detector(d) => Some(&d.thresholds),
            Self::Classifier(_) => None,
        }
    }

    /// Run one frame through the model, timing the call and updating fps
    pub fn run_inference(&self, image: &RgbImage) -> Result<InferenceResult> {
        let started = Instant::now();
        let detections = self.predict_image(image)?;
        let inference_time_millis = started.elapsed().as_secs_f64() * 1000.0;

        let fps_rate = match self {
            Self::Detector(d) => d.fps.tick(started),
            Self::Classifier(c) => c.fps.tick(started),
        };

        Ok(InferenceResult {
            detections,
            inference_time_millis,
            fps_rate,
        })
    }

    /// One-shot prediction on a still image; does not touch the fps meter
    pub fn predict_image(&self, image: &RgbImage) -> Result<Vec<Detection>> {
        match self {
            Self::Detector(d) => d.detect(image),
            Self::Classifier(c) => c.classify(image),
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("task", &self.task())
            .field("model", &self.name())
            .finish()
    }
}

/// Object detector with runtime-tunable thresholds
pub struct ObjectDetector {
    model: Box<dyn InferenceModel>,
    thresholds: Thresholds,
    fps: FpsMeter,
}

impl ObjectDetector {
    pub fn new(model: Box<dyn InferenceModel>, defaults: ThresholdDefaults) -> Self {
        Self {
            model,
            thresholds: Thresholds::new(defaults),
            fps: FpsMeter::default(),
        }
    }

    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>> {
        let candidates = self.model.infer(image)?;
        Ok(postprocess(candidates, self.thresholds.snapshot()))
    }
}

/// Whole-image classifier; reports the best `top_k` classes
pub struct ObjectClassifier {
    model: Box<dyn InferenceModel>,
    top_k: usize,
    fps: FpsMeter,
}

impl ObjectClassifier {
    pub fn new(model: Box<dyn InferenceModel>, top_k: usize) -> Self {
        Self {
            model,
            top_k,
            fps: FpsMeter::default(),
        }
    }

    fn classify(&self, image: &RgbImage) -> Result<Vec<Detection>> {
        let mut classes = self.model.infer(image)?;
        sort_by_confidence(&mut classes);
        classes.truncate(self.top_k);
        Ok(classes)
    }
}

/// Point-in-time copy of a detector's thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdValues {
    pub confidence: f32,
    pub iou: f32,
    pub num_items: usize,
}

/// Detector thresholds, each independently mutable while frames are in flight
#[derive(Debug)]
pub struct Thresholds {
    confidence: AtomicU32,
    iou: AtomicU32,
    num_items: AtomicUsize,
}

impl Thresholds {
    pub fn new(defaults: ThresholdDefaults) -> Self {
        Self {
            confidence: AtomicU32::new(defaults.confidence.clamp(0.0, 1.0).to_bits()),
            iou: AtomicU32::new(defaults.iou.clamp(0.0, 1.0).to_bits()),
            num_items: AtomicUsize::new(defaults.num_items),
        }
    }

    /// Set the minimum confidence, clamped to [0, 1]
    pub fn set_confidence(&self, value: f64) {
        self.confidence.store(unit_interval(value).to_bits(), Ordering::Relaxed);
    }

    /// Set the overlap cutoff for suppression, clamped to [0, 1]
    pub fn set_iou(&self, value: f64) {
        self.iou.store(unit_interval(value).to_bits(), Ordering::Relaxed);
    }

    /// Set the result limit; negative values mean zero
    pub fn set_num_items(&self, value: i64) {
        let value = usize::try_from(value.max(0)).unwrap_or(usize::MAX);
        self.num_items.store(value, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ThresholdValues {
        ThresholdValues {
            confidence: f32::from_bits(self.confidence.load(Ordering::Relaxed)),
            iou: f32::from_bits(self.iou.load(Ordering::Relaxed)),
            num_items: self.num_items.load(Ordering::Relaxed),
        }
    }
}

fn unit_interval(value: f64) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0) as f32
}

/// Exponentially smoothed frames-per-second over successive inference calls
#[derive(Debug, Default)]
struct FpsMeter {
    state: Mutex<FpsState>,
}

#[derive(Debug, Default)]
struct FpsState {
    last: Option<Instant>,
    smoothed: f64,
}

impl FpsMeter {
    fn tick(&self, now: Instant) -> f64 {
        let mut state = self.state.lock();
        if let Some(last) = state.last {
            let elapsed = now.saturating_duration_since(last).as_secs_f64();
            if elapsed > 0.0 {
                let instant_fps = 1.0 / elapsed;
                state.smoothed = if state.smoothed == 0.0 {
                    instant_fps
                } else {
                    state.smoothed * (1.0 - FPS_SMOOTHING) + instant_fps * FPS_SMOOTHING
                };
            }
        }
        state.last = Some(now);
        state.smoothed
    }
}

fn sort_by_confidence(detections: &mut [Detection]) {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(CmpOrdering::Equal)
    });
}

/// Confidence filter, per-label greedy suppression, then result limit
pub fn postprocess(mut candidates: Vec<Detection>, thresholds: ThresholdValues) -> Vec<Detection> {
    candidates.retain(|d| d.confidence >= thresholds.confidence);
    sort_by_confidence(&mut candidates);

    let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len().min(thresholds.num_items));
    for candidate in candidates {
        if kept.len() >= thresholds.num_items {
            break;
        }
        let suppressed = match candidate.bbox {
            Some(bbox) => kept.iter().any(|k| {
                k.label == candidate.label
                    && k.bbox.map_or(false, |kb| kb.iou(&bbox) > thresholds.iou)
            }),
            None => false,
        };
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
