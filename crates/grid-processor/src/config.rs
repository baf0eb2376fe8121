//! Configuration for the grid processor.

use crate::types::InterpolationMethod;
use serde::{Deserialize, Serialize};

/// Configuration for the grid processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridProcessorConfig {
    /// Side length of the square windows rasters are processed in.
    pub chunk_size: usize,

    /// Class values that are never treated as crop classes.
    pub exclude_values: Vec<i64>,

    /// Interpolation used when NDVI has to be resampled onto the class grid.
    pub interpolation: InterpolationMethod,
}

impl Default for GridProcessorConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            exclude_values: vec![0, 255],
            interpolation: InterpolationMethod::Bilinear,
        }
    }
}

impl GridProcessorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("AGRO_CHUNK_SIZE") {
            if let Ok(size) = val.parse() {
                config.chunk_size = size;
            }
        }

        if let Ok(val) = std::env::var("AGRO_EXCLUDE_VALUES") {
            let values: Result<Vec<i64>, _> = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse)
                .collect();
            if let Ok(values) = values {
                config.exclude_values = values;
            }
        }

        if let Ok(val) = std::env::var("AGRO_INTERPOLATION") {
            config.interpolation = InterpolationMethod::from_str(&val);
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be > 0".to_string());
        }

        Ok(())
    }

    /// True when `value` is one of the excluded class values.
    pub fn is_excluded(&self, value: i64) -> bool {
        self.exclude_values.contains(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GridProcessorConfig::default();
        assert_eq!(config.chunk_size, 2000);
        assert_eq!(config.exclude_values, vec![0, 255]);
        assert_eq!(config.interpolation, InterpolationMethod::Bilinear);
        assert!(config.is_excluded(255));
        assert!(!config.is_excluded(10));
    }

    #[test]
    fn test_config_validation() {
        let mut config = GridProcessorConfig::default();
        assert!(config.validate().is_ok());

        config.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_like_json_uses_defaults() {
        let config: GridProcessorConfig = serde_json::from_str(r#"{"chunk_size": 512}"#).unwrap();
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.exclude_values, vec![0, 255]);
    }
}
