//! Data-quality profiling and report serialization.
//!
//! The profiling engine re-examines the transformed dataset independently
//! of the orchestrator: it re-parses raw timestamps itself rather than
//! trusting the derived columns, so the report catches problems the
//! transform may have papered over with nulls.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;
use polars::prelude::*;
use thiserror::Error;

use crate::processors::timestamps::timestamps_as_utc_millis;
use crate::processors::TransformError;

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Errors that can occur during validation or report writing.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("dataframe operation failed: {0}")]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("failed to write report '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV rendering error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for validation operations.
pub type Result<T> = std::result::Result<T, ValidationError>;

/// The five profiling results of one validation run.
///
/// Sections are independent tables; [`QualityReport::sections`] yields
/// them in the fixed serialization order.
#[derive(Debug, Clone)]
pub struct QualityReport {
    /// Column-type and timestamp-parsability counters (one row).
    pub type_checks: DataFrame,
    /// Observed min/max `value` per reading type.
    pub range_checks: DataFrame,
    /// Total and null-`value` counts per reading type.
    pub missing: DataFrame,
    /// Hourly coverage gaps per (sensor, reading type).
    pub gaps: DataFrame,
    /// Same shape as `missing`, kept separate for independent consumption.
    pub profile: DataFrame,
}

impl QualityReport {
    /// Sections in serialization order.
    pub fn sections(&self) -> [(&'static str, &DataFrame); 5] {
        [
            ("type_checks", &self.type_checks),
            ("range_checks", &self.range_checks),
            ("missing", &self.missing),
            ("gaps", &self.gaps),
            ("profile", &self.profile),
        ]
    }
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

fn check_types(df: &DataFrame) -> Result<DataFrame> {
    let rows = df.height() as i64;

    let invalid_value_type = if is_numeric(df.column("value")?.dtype()) {
        0
    } else {
        rows
    };
    let timestamp_dtype = df.column("timestamp")?.dtype();
    let invalid_timestamp_type = match timestamp_dtype {
        DataType::String | DataType::Datetime(_, _) => 0,
        _ => rows,
    };

    let parsed = timestamps_as_utc_millis(df.column("timestamp")?)?;
    let unparsable = parsed.iter().filter(|p| p.is_none()).count() as i64;

    Ok(df!(
        "invalid_value_type" => [invalid_value_type],
        "invalid_timestamp_type" => [invalid_timestamp_type],
        "unparsable_timestamp_rows" => [unparsable],
    )?)
}

fn check_ranges(df: &DataFrame) -> Result<DataFrame> {
    Ok(df
        .clone()
        .lazy()
        .group_by([col("reading_type")])
        .agg([
            col("value").min().alias("min_value"),
            col("value").max().alias("max_value"),
        ])
        .sort(["reading_type"], Default::default())
        .collect()?)
}

fn count_missing(df: &DataFrame, null_column: &str) -> Result<DataFrame> {
    Ok(df
        .clone()
        .lazy()
        .group_by([col("reading_type")])
        .agg([
            col("value").len().alias("total"),
            col("value").is_null().sum().alias(null_column),
        ])
        .sort(["reading_type"], Default::default())
        .collect()?)
}

/// Hourly coverage analysis per (sensor, reading type).
///
/// Raw timestamps are parsed and floored to hour buckets; the expected
/// hours are the dense hourly sequence between the earliest and latest
/// bucket of each series, so a single observation yields zero gaps.
fn check_gaps(df: &DataFrame) -> Result<DataFrame> {
    let sensors = df.column("sensor_id")?.str()?;
    let types = df.column("reading_type")?.str()?;
    let parsed = timestamps_as_utc_millis(df.column("timestamp")?)?;

    let mut buckets: BTreeMap<(String, String), BTreeSet<i64>> = BTreeMap::new();
    for i in 0..df.height() {
        let (Some(sensor), Some(reading_type), Some(millis)) =
            (sensors.get(i), types.get(i), parsed[i])
        else {
            continue;
        };
        buckets
            .entry((sensor.to_string(), reading_type.to_string()))
            .or_default()
            .insert(millis.div_euclid(MILLIS_PER_HOUR));
    }

    let mut sensor_out: Vec<String> = Vec::with_capacity(buckets.len());
    let mut type_out: Vec<String> = Vec::with_capacity(buckets.len());
    let mut expected_out: Vec<i64> = Vec::with_capacity(buckets.len());
    let mut actual_out: Vec<i64> = Vec::with_capacity(buckets.len());
    let mut missing_out: Vec<i64> = Vec::with_capacity(buckets.len());

    for ((sensor, reading_type), hours) in buckets {
        // Non-empty by construction; bounds collapse for a single bucket.
        let first = *hours.first().unwrap();
        let last = *hours.last().unwrap();
        let expected = last - first + 1;
        let actual = hours.len() as i64;

        sensor_out.push(sensor);
        type_out.push(reading_type);
        expected_out.push(expected);
        actual_out.push(actual);
        missing_out.push(expected - actual);
    }

    Ok(df!(
        "sensor_id" => sensor_out,
        "reading_type" => type_out,
        "expected_hours" => expected_out,
        "actual_hours" => actual_out,
        "missing_hours" => missing_out,
    )?)
}

/// Profile the transformed dataset and assemble the quality report.
///
/// Returns `Ok(None)` for an empty dataset: there is nothing to validate
/// and no report artifact should be produced, which callers can tell
/// apart from a report with zero findings.
///
/// # Errors
///
/// Returns an error if a profiled column is missing or a query fails.
pub fn validate_data(df: &DataFrame) -> Result<Option<QualityReport>> {
    if df.height() == 0 {
        return Ok(None);
    }

    let report = QualityReport {
        type_checks: check_types(df)?,
        range_checks: check_ranges(df)?,
        missing: count_missing(df, "missing_values")?,
        gaps: check_gaps(df)?,
        profile: count_missing(df, "null_values")?,
    };
    Ok(Some(report))
}

fn csv_field(value: AnyValue) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        AnyValue::Boolean(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn render_csv(df: &DataFrame) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(df.get_column_names_str())?;
    for i in 0..df.height() {
        let record: Vec<String> = df
            .get_columns()
            .iter()
            .map(|c| c.get(i).map(csv_field))
            .collect::<PolarsResult<_>>()?;
        writer.write_record(&record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Serialize a quality report to a single text artifact.
///
/// Each section is a `## <name>` heading followed by the table as CSV and
/// a blank separator line, in the fixed section order. Parent directories
/// are created as needed.
pub fn write_report(report: &QualityReport, path: &Path) -> Result<()> {
    let path_str = path.display().to_string();
    let io_err = |source| ValidationError::Io {
        path: path_str.clone(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    for (name, table) in report.sections() {
        writeln!(writer, "## {}", name).map_err(io_err)?;
        writer.write_all(render_csv(table)?.as_bytes()).map_err(io_err)?;
        writeln!(writer).map_err(io_err)?;
    }
    writer.flush().map_err(io_err)?;

    info!("quality report saved at {}", path_str);
    Ok(())
}
