use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::SortError;

/// Run configuration, loaded from a TOML file and overridden by CLI flags.
///
/// A single immutable `Config` is threaded into every pipeline component;
/// nothing reads ambient global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory of reference face images (one known face per image).
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Directory of candidate images to sort.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Number of candidate images detected together in one batched call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum embedding distance for a face to count as a match.
    /// Smaller is stricter; must lie in [0, 1].
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,

    /// File extensions treated as candidate images (case-insensitive).
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    #[serde(default)]
    pub models: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Where ONNX model files are stored (downloaded on first use).
    #[serde(default = "default_models_dir")]
    pub dir: PathBuf,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("data/faces")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/sort")
}

fn default_batch_size() -> usize {
    32
}

fn default_tolerance() -> f32 {
    0.6
}

fn default_image_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "gif".to_string(),
        "webp".to_string(),
        "bmp".to_string(),
    ]
}

fn default_models_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("facesort")
        .join("models")
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: default_models_dir(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            data_dir: default_data_dir(),
            batch_size: default_batch_size(),
            tolerance: default_tolerance(),
            image_extensions: default_image_extensions(),
            models: ModelConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), SortError> {
        if self.batch_size == 0 {
            return Err(SortError::Configuration(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.tolerance) {
            return Err(SortError::Configuration(format!(
                "tolerance must be in [0, 1], got {}",
                self.tolerance
            )));
        }
        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("facesort")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.batch_size, 32);
        assert!((config.tolerance - 0.6).abs() < f32::EPSILON);
        assert!(config.image_extensions.iter().any(|e| e == "jpg"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let config = Config {
            batch_size: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(SortError::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range_tolerance() {
        let config = Config {
            tolerance: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            tolerance: -0.1,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "tolerance = 0.45\nbatch_size = 8\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.batch_size, 8);
        assert!((config.tolerance - 0.45).abs() < f32::EPSILON);
        // Unspecified fields fall back to defaults
        assert_eq!(config.input_dir, PathBuf::from("data/faces"));
    }
}
