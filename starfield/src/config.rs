//! Pipeline settings, loadable from YAML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detector::PeakDetectorConfig;
use crate::error::{Error, Result};
use crate::reconcile::MergePolicy;
use crate::tile_name::{self, DEFAULT_TILE_EXTENSION};
use crate::tiler::TileSize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tile_size: TileSize,
    /// Radius passed to the detector, in tile pixels.
    pub detection_radius: f32,
    /// Detections closer than this, in source pixels, are merged.
    pub boundary_tolerance: f64,
    pub merge_policy: MergePolicy,
    /// Overlay marker diameter in pixels.
    pub marker_size: u32,
    /// Concurrent tile workers. `0` uses every logical CPU.
    pub max_workers: usize,
    pub tile_extension: String,
    pub report_path: PathBuf,
    pub overlay_path: PathBuf,
    pub detector: PeakDetectorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tile_size: TileSize::default(),
            detection_radius: 50.0,
            boundary_tolerance: 50.0,
            merge_policy: MergePolicy::default(),
            marker_size: 20,
            max_workers: 0,
            tile_extension: DEFAULT_TILE_EXTENSION.to_string(),
            report_path: PathBuf::from("statistic.txt"),
            overlay_path: PathBuf::from("result.png"),
            detector: PeakDetectorConfig::default(),
        }
    }
}

impl Config {
    /// Reads and validates a YAML config. Missing keys take their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Config> {
        let yaml = std::fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config: Config = serde_yml::from_str(&yaml).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> std::result::Result<String, serde_yml::Error> {
        serde_yml::to_string(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.tile_size.validate()?;
        if !self.detection_radius.is_finite() || self.detection_radius <= 0.0 {
            return Err(Error::invalid_input(format!(
                "detection radius must be positive, got {}",
                self.detection_radius
            )));
        }
        if !self.boundary_tolerance.is_finite() || self.boundary_tolerance < 0.0 {
            return Err(Error::invalid_input(format!(
                "boundary tolerance must be finite and non-negative, got {}",
                self.boundary_tolerance
            )));
        }
        if !tile_name::is_tile_extension(&self.tile_extension) {
            return Err(Error::invalid_input(format!(
                "unsupported tile extension '{}'",
                self.tile_extension
            )));
        }
        Ok(())
    }
}
