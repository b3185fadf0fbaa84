use crate::models::pose::EstimateParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors raised while loading, saving or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Could not determine home directory")]
    NoHomeDirectory,

    #[error("Config file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Startup configuration for a teaching session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Number of trainable classes (one button each)
    pub num_classes: usize,
    /// Neighbour count used for predictions
    pub top_k: usize,
    /// Frame width in pixels
    pub frame_width: u32,
    /// Frame height in pixels
    pub frame_height: u32,
    /// Pose detection confidence threshold (0.0-1.0)
    pub min_confidence: f32,
    /// Pose model output stride (8, 16 or 32)
    pub output_stride: u32,
    /// Ask the estimator for horizontally flipped keypoints
    pub flip_horizontal: bool,
    /// Draw frames mirrored so the user sees themselves as in a mirror
    pub mirror_display: bool,
    /// Tick rate of the control loop
    pub target_fps: u32,
    /// Evict the oldest example of a class once it holds this many
    pub max_examples_per_class: Option<usize>,
    /// Skip recording and prediction when the pose score is below `min_confidence`
    pub skip_low_score_poses: bool,
    /// Where downloaded pose models are cached
    pub model_cache_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let mut model_cache_dir = Self::data_root().unwrap_or_else(|_| PathBuf::from("."));
        model_cache_dir.push("models");

        Self {
            num_classes: 3,
            top_k: 3,
            frame_width: 300,
            frame_height: 250,
            min_confidence: 0.5,
            output_stride: 16,
            flip_horizontal: true,
            mirror_display: true,
            target_fps: 30,
            max_examples_per_class: None,
            skip_low_score_poses: false,
            model_cache_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it with defaults if missing
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::get_config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Load and validate configuration from an explicit file
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to an explicit file
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        if self.num_classes == 0 || self.num_classes > 16 {
            return Err(ConfigError::Invalid(format!(
                "Invalid class count: {}. Must be between 1 and 16",
                self.num_classes
            )));
        }

        if self.top_k == 0 || self.top_k > 100 {
            return Err(ConfigError::Invalid(format!(
                "Invalid neighbour count: {}. Must be between 1 and 100",
                self.top_k
            )));
        }

        for (name, value) in [("width", self.frame_width), ("height", self.frame_height)] {
            if value == 0 || value > 4096 {
                return Err(ConfigError::Invalid(format!(
                    "Invalid frame {}: {}. Must be between 1 and 4096",
                    name, value
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "Invalid confidence threshold: {}. Must be between 0.0 and 1.0",
                self.min_confidence
            )));
        }

        if ![8, 16, 32].contains(&self.output_stride) {
            return Err(ConfigError::Invalid(format!(
                "Invalid output stride: {}. Must be one of: 8, 16, 32",
                self.output_stride
            )));
        }

        if self.target_fps == 0 || self.target_fps > 60 {
            return Err(ConfigError::Invalid(format!(
                "Invalid target FPS: {}. Must be between 1 and 60",
                self.target_fps
            )));
        }

        if self.max_examples_per_class == Some(0) {
            return Err(ConfigError::Invalid(
                "Example cap per class must be at least 1 when set".to_string(),
            ));
        }

        Ok(())
    }

    /// Reset to default configuration
    pub fn reset() -> ConfigResult<Self> {
        let config = Self::default();
        config.save()?;
        Ok(config)
    }

    /// Parameters handed to the pose estimator on every extraction
    pub fn estimate_params(&self) -> EstimateParams {
        EstimateParams {
            min_confidence: self.min_confidence,
            flip_horizontal: self.flip_horizontal,
            output_stride: self.output_stride,
        }
    }

    /// Interval between tick starts
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.target_fps.max(1) as f64)
    }

    /// Get the configuration file path
    fn get_config_path() -> ConfigResult<PathBuf> {
        let mut path = Self::data_root()?;
        path.push("config");
        path.push("settings.json");
        Ok(path)
    }

    fn data_root() -> ConfigResult<PathBuf> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| ConfigError::NoHomeDirectory)?;

        let mut path = PathBuf::from(home);
        path.push(".pose_teach");
        Ok(path)
    }
}
