//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use visionbridge_dispatch::DispatchConfig;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Synthetic camera settings
    #[serde(default)]
    pub camera: CameraConfig,

    /// Directory relative model paths are resolved against
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Dispatcher settings
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl ServerConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &crate::Cli) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        // Apply CLI overrides
        if let Some(listen) = &cli.listen {
            config.listen = listen.clone();
        }

        if let Some(port) = cli.port {
            config.port = port;
        }

        config.camera.validate()?;
        config.dispatch.validate()?;

        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            camera: CameraConfig::default(),
            models_dir: default_models_dir(),
            dispatch: DispatchConfig::default(),
        }
    }
}

/// Synthetic camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Frames per second produced by the capture thread
    #[serde(default = "default_fps")]
    pub fps: u32,
}

impl CameraConfig {
    fn validate(&self) -> anyhow::Result<()> {
        if self.width == 0 || self.height == 0 {
            anyhow::bail!("camera resolution must be non-zero, got {}x{}", self.width, self.height);
        }
        if self.fps == 0 {
            anyhow::bail!("camera fps must be at least 1");
        }
        Ok(())
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("./models")
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_fps() -> u32 {
    15
}
