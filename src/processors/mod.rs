//! Enrichment stages and the quality-assurance engine.

use polars::prelude::PolarsError;
use thiserror::Error;

pub mod aggregation;
pub mod calibration;
pub mod outliers;
pub mod timestamps;
pub mod transform;
pub mod validation;

// Re-export key functions for convenience
pub use aggregation::{add_aggregates, add_daily_average, add_rolling_mean};
pub use calibration::{apply_calibration, flag_anomalies};
pub use outliers::correct_outliers;
pub use timestamps::{normalize_timestamps, parse_timestamp_utc};
pub use transform::transform_data;
pub use validation::{validate_data, write_report, QualityReport, ValidationError};

/// Errors that can occur while transforming a dataset.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("dataframe operation failed: {0}")]
    Polars(#[from] PolarsError),

    #[error("required column missing: {0}")]
    MissingColumn(String),
}

/// Result type for transform stage operations.
pub type Result<T> = std::result::Result<T, TransformError>;
