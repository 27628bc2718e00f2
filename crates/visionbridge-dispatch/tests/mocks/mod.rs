//! Mock collaborators for dispatcher tests
//!
//! Configurable stand-ins for the model, the model loader and the camera,
//! with call counters so tests can see what the dispatcher touched.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use visionbridge_core::{
    BoundingBox, Detection, Error, Frame, FrameSource, InferenceModel, ModelLoader, ModelTask,
    Result,
};

/// Three well separated boxes with confidences 0.95, 0.6 and 0.4
pub fn default_detections(label: &str) -> Vec<Detection> {
    vec![
        Detection::boxed(label, 0, 0.95, BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
        Detection::boxed(label, 0, 0.6, BoundingBox::new(100.0, 0.0, 10.0, 10.0)),
        Detection::boxed(label, 0, 0.4, BoundingBox::new(200.0, 0.0, 10.0, 10.0)),
    ]
}

/// A model returning fixed detections
pub struct MockModel {
    name: String,
    detections: Vec<Detection>,
    latency: Option<Duration>,
    fail: bool,
    calls: Arc<AtomicU32>,
}

impl MockModel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            detections: default_detections(name),
            latency: None,
            fail: false,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn with_detections(mut self, detections: Vec<Detection>) -> Self {
        self.detections = detections;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Shared counter of `infer` calls
    pub fn calls(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }
}

impl InferenceModel for MockModel {
    fn infer(&self, _image: &RgbImage) -> Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        if self.fail {
            return Err(Error::inference(format!("{} refused the frame", self.name)));
        }
        Ok(self.detections.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Loads a [`MockModel`] named after the file stem of any requested path
#[derive(Default)]
pub struct MockLoader {
    delays: HashMap<PathBuf, Duration>,
    failing: Vec<PathBuf>,
    model_latency: Option<Duration>,
    loads: AtomicU32,
    calls: Mutex<HashMap<String, Arc<AtomicU32>>>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make loading `path` take `delay`
    pub fn with_delay(mut self, path: &str, delay: Duration) -> Self {
        self.delays.insert(PathBuf::from(path), delay);
        self
    }

    /// Make loading `path` fail
    pub fn with_failure(mut self, path: &str) -> Self {
        self.failing.push(PathBuf::from(path));
        self
    }

    /// Give every loaded model this inference latency
    pub fn with_model_latency(mut self, latency: Duration) -> Self {
        self.model_latency = Some(latency);
        self
    }

    pub fn load_count(&self) -> u32 {
        self.loads.load(Ordering::SeqCst)
    }

    /// `infer` calls seen by the most recent model loaded under `name`
    pub fn infer_calls(&self, name: &str) -> u32 {
        self.calls
            .lock()
            .get(name)
            .map_or(0, |c| c.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl ModelLoader for MockLoader {
    async fn load(&self, path: &Path, _task: ModelTask) -> Result<Box<dyn InferenceModel>> {
        self.loads.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(path) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.iter().any(|p| p == path) {
            return Err(Error::config(format!("cannot open {}", path.display())));
        }

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut model = MockModel::new(&name);
        if let Some(latency) = self.model_latency {
            model = model.with_latency(latency);
        }
        self.calls.lock().insert(name, model.calls());

        Ok(Box::new(model))
    }
}

/// A camera whose latest frame is set by the test
#[derive(Default)]
pub struct MockCamera {
    latest: Mutex<Option<Frame>>,
    stopped: AtomicBool,
    zoom: Mutex<Option<f64>>,
    reads: AtomicU32,
}

impl MockCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Camera that already captured one frame
    pub fn with_frame(frame: Frame) -> Self {
        let camera = Self::default();
        camera.set_latest(frame);
        camera
    }

    pub fn set_latest(&self, frame: Frame) {
        *self.latest.lock() = Some(frame);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn zoom(&self) -> Option<f64> {
        *self.zoom.lock()
    }

    /// Number of `latest_frame` calls
    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }
}

impl FrameSource for MockCamera {
    fn latest_frame(&self) -> Option<Frame> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.latest.lock().clone()
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn set_zoom_ratio(&self, ratio: f64) -> Result<()> {
        *self.zoom.lock() = Some(ratio);
        Ok(())
    }
}

/// A small solid-color RGB frame
pub fn test_frame(sequence: u64) -> Frame {
    Frame::from_rgb(sequence, RgbImage::from_pixel(32, 24, Rgb([90, 120, 200])))
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("visionbridge=debug")
        .try_init();
}
