//! Configuration system
//!
//! Settings for index construction and contact detection, loadable from
//! TOML or RON files through the [`Config`] trait.

pub use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::spatial::VolumeKind;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Bounding volume hierarchy construction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BvhConfig {
    /// Kind of bounding volume stored in every node
    pub volume_kind: VolumeKind,

    /// A node with at most this many elements becomes a leaf
    pub max_leaf_size: usize,

    /// Optional depth limit; nodes at this depth become leaves
    pub max_depth: Option<u32>,

    /// Margin added uniformly to every element volume
    pub inflate: f64,
}

impl Default for BvhConfig {
    fn default() -> Self {
        Self {
            volume_kind: VolumeKind::Aabb,
            max_leaf_size: 1,
            max_depth: None,
            inflate: 0.0,
        }
    }
}

impl BvhConfig {
    /// Check the settings before a build
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.max_leaf_size == 0 {
            return Err(ModelError::Tolerance("max_leaf_size must be at least 1".to_string()));
        }
        if !self.inflate.is_finite() || self.inflate < 0.0 {
            return Err(ModelError::Tolerance(format!(
                "inflate must be a finite non-negative margin, got {}",
                self.inflate
            )));
        }
        Ok(())
    }
}

/// Contact detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactSettings {
    /// Linear tolerance: broad-phase inflation and face coplanarity distance
    pub tolerance: f64,

    /// Maximum angle (radians) between a face normal and the reversed normal of its partner
    pub angular_tolerance: f64,

    /// Contact regions with a smaller area are discarded
    pub area_tolerance: f64,

    /// Abort on the first per-pair failure instead of skipping the pair
    pub strict: bool,

    /// Broad-phase hierarchy settings (the volume kind is forced to OBB)
    pub bvh: BvhConfig,

    /// Keep only candidate pairs among each other's `k` nearest centroids
    pub max_neighbours: Option<usize>,

    /// Keep only candidate pairs whose centroids are closer than this distance
    pub max_distance: Option<f64>,
}

impl Default for ContactSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-3,
            angular_tolerance: 1e-3,
            area_tolerance: 1e-6,
            strict: false,
            bvh: BvhConfig {
                volume_kind: VolumeKind::Obb,
                ..BvhConfig::default()
            },
            max_neighbours: None,
            max_distance: None,
        }
    }
}

impl Config for ContactSettings {}

impl ContactSettings {
    /// Settings with the given linear tolerance and defaults elsewhere
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self {
            tolerance,
            ..Self::default()
        }
    }

    /// Report tolerance misuse before any computation starts
    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ModelError::Tolerance(format!(
                "tolerance must be finite and non-negative, got {}",
                self.tolerance
            )));
        }
        if !(self.angular_tolerance > 0.0) {
            return Err(ModelError::Tolerance(format!(
                "angular_tolerance must be positive, got {}",
                self.angular_tolerance
            )));
        }
        if !(self.area_tolerance > 0.0) {
            return Err(ModelError::Tolerance(format!(
                "area_tolerance must be positive, got {}",
                self.area_tolerance
            )));
        }
        if let Some(distance) = self.max_distance {
            if !(distance > 0.0) {
                return Err(ModelError::Tolerance(format!(
                    "max_distance must be positive, got {distance}"
                )));
            }
        }
        if self.max_neighbours == Some(0) {
            return Err(ModelError::Tolerance("max_neighbours must be at least 1".to_string()));
        }
        self.bvh.validate()
    }
}
