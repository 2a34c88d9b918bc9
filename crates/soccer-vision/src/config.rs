//! JSON configuration for the whole pipeline.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use soccer_vision_ball::BallDetectorParams;
use soccer_vision_core::FlatGroundCamera;
use soccer_vision_field::FieldFeatureParams;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn default_report_every() -> u32 {
    300
}

/// Every tunable of the pipeline. Missing fields take their defaults, so a
/// config file only needs the values it overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisionConfig {
    #[serde(default)]
    pub ball: BallDetectorParams,
    #[serde(default)]
    pub field: FieldFeatureParams,
    /// Projection used by the example and by offline runs.
    #[serde(default)]
    pub camera: FlatGroundCamera,
    /// Frames between timing reports; 0 disables them.
    #[serde(default = "default_report_every")]
    pub report_every: u32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            ball: BallDetectorParams::default(),
            field: FieldFeatureParams::default(),
            camera: FlatGroundCamera::default(),
            report_every: default_report_every(),
        }
    }
}

impl VisionConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
