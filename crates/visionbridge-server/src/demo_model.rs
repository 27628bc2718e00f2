//! Demo model loader
//!
//! Stands in for a real inference runtime: loading only checks that the model
//! file exists, and the resulting models derive deterministic results from
//! image brightness and color.

use async_trait::async_trait;
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::debug;
use visionbridge_core::{BoundingBox, Detection, Error, InferenceModel, ModelLoader, ModelTask, Result};

/// Grid cells per side scanned by the demo detector
const GRID: u32 = 4;

/// Mean cell brightness (0-1) a detector candidate needs
const MIN_BRIGHTNESS: f32 = 0.35;

const COLOR_LABELS: [&str; 3] = ["red", "green", "blue"];

/// Resolves model files under a models directory
pub struct DemoModelLoader {
    models_dir: PathBuf,
}

impl DemoModelLoader {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.models_dir.join(path)
        }
    }
}

#[async_trait]
impl ModelLoader for DemoModelLoader {
    async fn load(&self, path: &Path, task: ModelTask) -> Result<Box<dyn InferenceModel>> {
        let resolved = self.resolve(path);
        let metadata = tokio::fs::metadata(&resolved).await?;
        if !metadata.is_file() {
            return Err(Error::config(format!(
                "model path is not a file: {}",
                resolved.display()
            )));
        }

        let name = resolved
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());
        debug!("Demo {} model '{}' read from {}", task.as_str(), name, resolved.display());

        Ok(Box::new(DemoModel { name, task }))
    }
}

pub struct DemoModel {
    name: String,
    task: ModelTask,
}

impl DemoModel {
    /// One candidate per bright grid cell, plus a shifted duplicate that
    /// overlap suppression is expected to remove
    fn detect(&self, image: &RgbImage) -> Vec<Detection> {
        let (width, height) = image.dimensions();
        let cell_w = (width / GRID).max(1);
        let cell_h = (height / GRID).max(1);
        let mut candidates = Vec::new();

        for row in 0..GRID {
            for col in 0..GRID {
                let (x, y) = (col * cell_w, row * cell_h);
                if x >= width || y >= height {
                    continue;
                }
                let brightness = mean_brightness(image, x, y, cell_w, cell_h);
                if brightness < MIN_BRIGHTNESS {
                    continue;
                }

                let index = (row * GRID + col) as usize;
                let bbox = BoundingBox::new(x as f32, y as f32, cell_w as f32, cell_h as f32);
                candidates.push(Detection::boxed("bright_region", index, brightness, bbox));

                let shifted = BoundingBox::new(x as f32 + 1.0, y as f32 + 1.0, cell_w as f32, cell_h as f32);
                candidates.push(Detection::boxed("bright_region", index, brightness * 0.9, shifted));
            }
        }

        candidates
    }

    /// Share of each color channel in the whole image
    fn classify(&self, image: &RgbImage) -> Vec<Detection> {
        let mut sums = [0f64; 3];
        for pixel in image.pixels() {
            for (sum, channel) in sums.iter_mut().zip(pixel.0) {
                *sum += f64::from(channel);
            }
        }
        let total: f64 = sums.iter().sum();

        COLOR_LABELS
            .iter()
            .zip(sums)
            .enumerate()
            .map(|(index, (label, sum))| {
                let confidence = if total > 0.0 { sum / total } else { 1.0 / 3.0 };
                Detection::class(*label, index, confidence as f32)
            })
            .collect()
    }
}

impl InferenceModel for DemoModel {
    fn infer(&self, image: &RgbImage) -> Result<Vec<Detection>> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::inference("empty image"));
        }
        Ok(match self.task {
            ModelTask::Detect => self.detect(image),
            ModelTask::Classify => self.classify(image),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn mean_brightness(image: &RgbImage, x: u32, y: u32, w: u32, h: u32) -> f32 {
    let x_end = (x + w).min(image.width());
    let y_end = (y + h).min(image.height());
    let mut sum = 0u64;
    let mut count = 0u64;

    for py in y..y_end {
        for px in x..x_end {
            let [r, g, b] = image.get_pixel(px, py).0;
            sum += u64::from(r) + u64::from(g) + u64::from(b);
            count += 3;
        }
    }

    if count == 0 {
        0.0
    } else {
        sum as f32 / (count as f32 * 255.0)
    }
}
