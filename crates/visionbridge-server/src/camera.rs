//! Synthetic frame source
//!
//! Produces a moving RGB test pattern on a dedicated capture thread and
//! hands every frame to the registered [`FrameListener`], the way a device
//! camera pipeline would.

use image::{Rgb, RgbImage};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use visionbridge_core::{Error, Frame, FrameListener, FrameSource, Result};

use crate::config::CameraConfig;

const MAX_ZOOM: f64 = 8.0;

pub struct SyntheticCamera {
    config: CameraConfig,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    latest: RwLock<Option<Frame>>,
    stopped: AtomicBool,
    // f64 bits
    zoom: AtomicU64,
}

impl SyntheticCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                latest: RwLock::new(None),
                stopped: AtomicBool::new(false),
                zoom: AtomicU64::new(1.0f64.to_bits()),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Start the capture thread, delivering frames to `listener`
    pub fn start(&self, listener: Arc<dyn FrameListener>) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        let handle = std::thread::Builder::new()
            .name("visionbridge-capture".to_string())
            .spawn(move || capture_loop(shared, config, listener))?;
        *worker = Some(handle);

        info!(
            "Camera started: {}x{} at {} fps",
            self.config.width, self.config.height, self.config.fps
        );
        Ok(())
    }

    /// Stop capturing and wait for the capture thread to exit
    pub fn shutdown(&self) {
        self.stop();
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                tracing::error!("Capture thread panicked");
            }
        }
    }

    pub fn zoom_ratio(&self) -> f64 {
        f64::from_bits(self.shared.zoom.load(Ordering::Relaxed))
    }
}

impl FrameSource for SyntheticCamera {
    fn latest_frame(&self) -> Option<Frame> {
        self.shared.latest.read().clone()
    }

    fn stop(&self) {
        if !self.shared.stopped.swap(true, Ordering::SeqCst) {
            info!("Camera stopped");
        }
    }

    fn set_zoom_ratio(&self, ratio: f64) -> Result<()> {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(Error::invalid_arguments(
                "setZoomRatio",
                format!("zoom ratio must be positive, got {}", ratio),
            ));
        }
        let ratio = ratio.clamp(1.0, MAX_ZOOM);
        self.shared.zoom.store(ratio.to_bits(), Ordering::Relaxed);
        debug!("Zoom ratio set to {}", ratio);
        Ok(())
    }
}

fn capture_loop(shared: Arc<Shared>, config: CameraConfig, listener: Arc<dyn FrameListener>) {
    let period = Duration::from_secs_f64(1.0 / f64::from(config.fps));
    let mut sequence = 0u64;

    while !shared.stopped.load(Ordering::SeqCst) {
        let started = Instant::now();
        let zoom = f64::from_bits(shared.zoom.load(Ordering::Relaxed));
        let frame = Frame::from_rgb(sequence, test_pattern(&config, sequence, zoom));

        *shared.latest.write() = Some(frame.clone());
        listener.on_frame(&frame);
        sequence += 1;

        if let Some(remaining) = period.checked_sub(started.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    debug!("Capture thread exiting after {} frames", sequence);
}

/// Diagonal gradient with a bright square sweeping across it
fn test_pattern(config: &CameraConfig, sequence: u64, zoom: f64) -> RgbImage {
    let (width, height) = (config.width, config.height);
    let side = ((width.min(height) as f64 / 4.0) * zoom).min(width.min(height) as f64) as u32;
    let travel = width.saturating_sub(side).max(1);
    let left = ((sequence * 4) % u64::from(travel)) as u32;
    let top = (height.saturating_sub(side)) / 2;
    let shift = (sequence % 256) as u32;

    RgbImage::from_fn(width, height, |x, y| {
        if x >= left && x < left + side && y >= top && y < top + side {
            Rgb([250, 250, 240])
        } else {
            let r = ((x * 255 / width.max(1)) + shift) % 256;
            let g = (y * 255 / height.max(1)) % 256;
            Rgb([r as u8, g as u8, 60])
        }
    })
}
