use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::APP_DIR_NAME;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which detector variant a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    #[default]
    Face,
    Pedestrian,
}

/// Multi-scale cascade search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeParams {
    pub scale_factor: f64,
    pub min_neighbors: u32,
    pub min_size: (u32, u32),
    pub max_size: Option<(u32, u32)>,
    /// Report only the largest grouped region. Fixed for the session lifetime.
    pub biggest_only: bool,
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.2,
            min_neighbors: 2,
            min_size: (20, 20),
            max_size: None,
            biggest_only: true,
        }
    }
}

/// Sliding-window parameters for the HOG people detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HogParams {
    pub hit_threshold: f64,
    pub win_stride: (u32, u32),
    pub scale_factor: f64,
    pub group_threshold: u32,
    pub max_levels: usize,
}

impl Default for HogParams {
    fn default() -> Self {
        Self {
            hit_threshold: 0.0,
            win_stride: (8, 8),
            scale_factor: 1.05,
            group_threshold: 2,
            max_levels: 64,
        }
    }
}

/// Session configuration, loadable from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub pipeline: PipelineKind,
    pub cascade: CascadeParams,
    pub hog: HogParams,
}

impl DetectorConfig {
    /// Platform config location: `<config_dir>/Facemark/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: DetectorConfig =
            serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the platform config file, falling back to defaults when the
    /// file is missing or unusable.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring config: {e}");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cascade.validate()?;
        self.hog.validate()
    }
}

impl CascadeParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scale_factor.is_nan() || self.scale_factor <= 1.0 {
            return Err(ConfigError::Invalid(format!(
                "cascade scale_factor must be > 1.0, got {}",
                self.scale_factor
            )));
        }
        if let Some((mw, mh)) = self.max_size {
            if mw < self.min_size.0 || mh < self.min_size.1 {
                return Err(ConfigError::Invalid(
                    "cascade max_size must not be smaller than min_size".into(),
                ));
            }
        }
        Ok(())
    }

    /// These parameters if valid, otherwise the defaults.
    pub fn or_default(self) -> Self {
        match self.validate() {
            Ok(()) => self,
            Err(e) => {
                log::warn!("Using default cascade parameters: {e}");
                Self::default()
            }
        }
    }
}

impl HogParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scale_factor.is_nan() || self.scale_factor <= 1.0 {
            return Err(ConfigError::Invalid(format!(
                "hog scale_factor must be > 1.0, got {}",
                self.scale_factor
            )));
        }
        if self.win_stride.0 == 0 || self.win_stride.1 == 0 {
            return Err(ConfigError::Invalid("hog win_stride must be positive".into()));
        }
        if self.max_levels == 0 {
            return Err(ConfigError::Invalid("hog max_levels must be positive".into()));
        }
        Ok(())
    }

    /// These parameters if valid, otherwise the defaults.
    pub fn or_default(self) -> Self {
        match self.validate() {
            Ok(()) => self,
            Err(e) => {
                log::warn!("Using default HOG parameters: {e}");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_reference_configuration() {
        let config = DetectorConfig::default();
        assert_eq!(config.pipeline, PipelineKind::Face);
        assert_relative_eq!(config.cascade.scale_factor, 1.2);
        assert_eq!(config.cascade.min_neighbors, 2);
        assert_eq!(config.cascade.min_size, (20, 20));
        assert!(config.cascade.biggest_only);
        assert_relative_eq!(config.hog.scale_factor, 1.05);
        assert_eq!(config.hog.win_stride, (8, 8));
        assert_eq!(config.hog.group_threshold, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_json_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(
            &path,
            r#"{"pipeline": "pedestrian", "cascade": {"biggest_only": false}}"#,
        )
        .unwrap();

        let config = DetectorConfig::load(&path).unwrap();
        assert_eq!(config.pipeline, PipelineKind::Pedestrian);
        assert!(!config.cascade.biggest_only);
        assert_eq!(config.cascade.min_neighbors, 2);
        assert_eq!(config.hog, HogParams::default());
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let result = DetectorConfig::load(Path::new("/nonexistent/config.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_malformed_json_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            DetectorConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_scale_factor_of_one() {
        let mut config = DetectorConfig::default();
        config.cascade.scale_factor = 1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_max_below_min() {
        let mut config = DetectorConfig::default();
        config.cascade.max_size = Some((10, 10));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_stride() {
        let mut config = DetectorConfig::default();
        config.hog.win_stride = (0, 8);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_params_fall_back_to_defaults() {
        let cascade = CascadeParams {
            scale_factor: 1.0,
            min_neighbors: 5,
            ..CascadeParams::default()
        };
        assert_eq!(cascade.or_default(), CascadeParams::default());

        let hog = HogParams {
            scale_factor: 0.9,
            ..HogParams::default()
        };
        assert_eq!(hog.or_default(), HogParams::default());
    }

    #[test]
    fn test_valid_params_are_kept() {
        let cascade = CascadeParams {
            biggest_only: false,
            ..CascadeParams::default()
        };
        assert!(!cascade.clone().or_default().biggest_only);
    }

    #[test]
    fn test_default_path_is_under_app_dir() {
        if let Some(path) = DetectorConfig::default_path() {
            assert!(path.to_string_lossy().contains(APP_DIR_NAME));
        }
    }
}
