//! Transform orchestrator: cleanup, imputation and stage sequencing.

use log::{debug, info};
use polars::prelude::*;

use crate::config::PipelineConfig;
use crate::processors::{
    add_aggregates, apply_calibration, correct_outliers, flag_anomalies, normalize_timestamps,
    Result, TransformError,
};

/// Columns a row must carry to survive the cleanup pass.
const REQUIRED_COLUMNS: [&str; 4] = ["sensor_id", "timestamp", "reading_type", "value"];

/// Fill missing battery levels in place of the raw column.
///
/// Precedence: forward-fill, then backward-fill (which can only touch a
/// leading gap after the forward pass), then the original column mean for
/// anything still missing. An entirely null column has no mean, so it
/// stays null.
fn impute_battery(df: &DataFrame) -> Result<DataFrame> {
    let Ok(column) = df.column("battery_level") else {
        return Ok(df.clone());
    };
    if column.null_count() == 0 {
        return Ok(df.clone());
    }

    let floats = column.cast(&DataType::Float64)?;
    let floats = floats.f64()?;
    let mean = floats.mean();
    let mut values: Vec<Option<f64>> = floats.into_iter().collect();

    let mut last = None;
    for value in values.iter_mut() {
        match value {
            Some(v) => last = Some(*v),
            None => *value = last,
        }
    }
    let mut next = None;
    for value in values.iter_mut().rev() {
        match value {
            Some(v) => next = Some(*v),
            None => *value = next,
        }
    }
    if let Some(mean) = mean {
        for value in values.iter_mut() {
            if value.is_none() {
                *value = Some(mean);
            }
        }
    }

    let mut out = df.clone();
    out.with_column(Series::new("battery_level".into(), values))?;
    Ok(out)
}

/// Run the full transformation pipeline over a raw dataset.
///
/// Steps, in fixed order:
/// 1. Drop exact duplicates on (`sensor_id`, `timestamp`, `reading_type`),
///    keeping the first occurrence.
/// 2. Drop rows with a null `sensor_id`, `timestamp`, `reading_type` or
///    `value`.
/// 3. Impute missing battery levels.
/// 4. Calibrate, correct outliers, flag anomalies, normalize timestamps,
///    aggregate. Anomaly flagging reads the *calibrated* value while
///    aggregation reads the *corrected* one; the stage order matters.
///
/// An empty input produces an empty output, never an error. The input is
/// never mutated.
///
/// # Errors
///
/// Returns [`TransformError::MissingColumn`] if a required column is
/// absent, or a polars error from any stage.
pub fn transform_data(raw: &DataFrame, config: &PipelineConfig) -> Result<DataFrame> {
    if raw.height() == 0 {
        debug!("empty input dataset, nothing to transform");
        return Ok(raw.clone());
    }
    for name in REQUIRED_COLUMNS {
        if raw.column(name).is_err() {
            return Err(TransformError::MissingColumn(name.to_string()));
        }
    }

    let cleaned = raw
        .clone()
        .lazy()
        .unique_stable(
            Some(vec![
                "sensor_id".into(),
                "timestamp".into(),
                "reading_type".into(),
            ]),
            UniqueKeepStrategy::First,
        )
        .filter(
            col("sensor_id")
                .is_not_null()
                .and(col("timestamp").is_not_null())
                .and(col("reading_type").is_not_null())
                .and(col("value").is_not_null()),
        )
        .collect()?;
    debug!(
        "cleanup: {} rows in, {} rows after dedup and null drop",
        raw.height(),
        cleaned.height()
    );

    let imputed = impute_battery(&cleaned)?;

    let calibrated = apply_calibration(&imputed, &config.calibration)?;
    let corrected = correct_outliers(&calibrated)?;
    let flagged = flag_anomalies(&corrected, &config.expected_ranges)?;
    let normalized = normalize_timestamps(&flagged)?;
    let transformed = add_aggregates(&normalized)?;

    info!(
        "transformed {} rows into {} columns",
        transformed.height(),
        transformed.width()
    );
    Ok(transformed)
}
