//! Configuration types for the telemetry pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Linear calibration parameters for one reading type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Calibration {
    /// Multiplier applied to the raw value
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Offset added after the multiplier
    #[serde(default)]
    pub offset: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            multiplier: default_multiplier(),
            offset: 0.0,
        }
    }
}

/// Physical plausibility range for one reading type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ValueRange {
    /// Minimum plausible value (inclusive)
    pub min: f64,

    /// Maximum plausible value (inclusive)
    pub max: f64,
}

fn default_calibration() -> HashMap<String, Calibration> {
    let mut table = HashMap::new();
    table.insert(
        "temperature".to_string(),
        Calibration {
            multiplier: 1.01,
            offset: -0.2,
        },
    );
    table.insert(
        "humidity".to_string(),
        Calibration {
            multiplier: 1.0,
            offset: 0.0,
        },
    );
    table.insert(
        "soil_moisture".to_string(),
        Calibration {
            multiplier: 0.98,
            offset: 0.5,
        },
    );
    table.insert(
        "light_intensity".to_string(),
        Calibration {
            multiplier: 1.0,
            offset: 0.0,
        },
    );
    table
}

fn default_expected_ranges() -> HashMap<String, ValueRange> {
    let mut ranges = HashMap::new();
    ranges.insert("temperature".to_string(), ValueRange { min: -10.0, max: 60.0 });
    ranges.insert("humidity".to_string(), ValueRange { min: 0.0, max: 100.0 });
    ranges.insert("soil_moisture".to_string(), ValueRange { min: 0.0, max: 1.0 });
    ranges.insert("light_intensity".to_string(), ValueRange { min: 0.0, max: 2000.0 });
    ranges.insert("battery_level".to_string(), ValueRange { min: 0.0, max: 100.0 });
    ranges
}

/// Configuration for the synthetic sample-data generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Number of sensors to simulate
    #[serde(default = "default_num_sensors")]
    pub num_sensors: u32,

    /// Number of consecutive days to generate
    #[serde(default = "default_num_days")]
    pub days: u32,

    /// First generated calendar day
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,

    /// RNG seed for reproducible datasets
    #[serde(default)]
    pub seed: u64,
}

fn default_num_sensors() -> u32 {
    5
}

fn default_num_days() -> u32 {
    5
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            num_sensors: default_num_sensors(),
            days: default_num_days(),
            start_date: default_start_date(),
            seed: 0,
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Per-reading-type linear calibration table.
    /// Types absent from the table calibrate with multiplier 1.0, offset 0.0.
    #[serde(default = "default_calibration")]
    pub calibration: HashMap<String, Calibration>,

    /// Per-reading-type plausibility ranges used for anomaly flagging.
    /// Types absent from the table are never flagged.
    #[serde(default = "default_expected_ranges")]
    pub expected_ranges: HashMap<String, ValueRange>,

    #[serde(default)]
    pub generator: GeneratorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            calibration: default_calibration(),
            expected_ranges: default_expected_ranges(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_calibration_table() {
        let config = PipelineConfig::default();
        let temp = config.calibration.get("temperature").unwrap();
        assert!((temp.multiplier - 1.01).abs() < 1e-12);
        assert!((temp.offset + 0.2).abs() < 1e-12);

        let soil = config.expected_ranges.get("soil_moisture").unwrap();
        assert_eq!(soil.min, 0.0);
        assert_eq!(soil.max, 1.0);
    }

    #[test]
    fn test_unknown_type_calibrates_as_identity() {
        let fallback = Calibration::default();
        assert_eq!(fallback.multiplier, 1.0);
        assert_eq!(fallback.offset, 0.0);
    }

    #[test]
    fn test_default_generator_config() {
        let config = GeneratorConfig::default();
        assert_eq!(config.num_sensors, 5);
        assert_eq!(config.days, 5);
        assert_eq!(config.start_date, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
    }

    #[test]
    fn test_yaml_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pipeline.yaml");

        let mut config = PipelineConfig::default();
        config.generator.seed = 42;
        config.to_yaml(&path).unwrap();

        let loaded = PipelineConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded.generator.seed, 42);
        let humidity = loaded.expected_ranges.get("humidity").unwrap();
        assert_eq!(humidity.max, 100.0);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("partial.yaml");
        std::fs::write(&path, "generator:\n  num_sensors: 3\n").unwrap();

        let config = PipelineConfig::from_yaml(&path).unwrap();
        assert_eq!(config.generator.num_sensors, 3);
        assert_eq!(config.generator.days, 5);
        assert!(config.calibration.contains_key("temperature"));
    }
}
