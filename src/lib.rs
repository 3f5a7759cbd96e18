//! Agricultural sensor telemetry enrichment and quality-assurance pipeline.
//!
//! This crate provides tools for:
//! - Checkpointed ingestion of raw parquet sensor batches
//! - Calibration, outlier correction and anomaly flagging of readings
//! - Timestamp normalization (UTC+05:30) and daily/rolling aggregation
//! - Data-quality profiling with a structured report
//! - Partitioned parquet storage of the transformed dataset
//!
//! # Example
//!
//! ```no_run
//! use agri_pipeline::config::PipelineConfig;
//! use agri_pipeline::processors::transform_data;
//! use polars::prelude::*;
//!
//! let raw = df!(
//!     "sensor_id" => ["sensor_1"],
//!     "timestamp" => ["2025-07-01T06:00:00"],
//!     "reading_type" => ["temperature"],
//!     "value" => [25.0],
//!     "battery_level" => [88.0],
//! )
//! .unwrap();
//!
//! let config = PipelineConfig::default();
//! let transformed = transform_data(&raw, &config).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{Calibration, GeneratorConfig, PipelineConfig, ValueRange};
pub use processors::{transform_data, validate_data, QualityReport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
