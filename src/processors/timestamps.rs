//! Timestamp normalization to the pipeline's target timezone.
//!
//! Raw timestamps arrive as UTC instants, either textual or already typed
//! as datetimes. Parse failures become nulls that flow through every
//! derived column; the validation engine counts them later.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use polars::prelude::*;

use crate::processors::Result;

/// Offset of the target timezone (UTC+05:30) in seconds.
pub const TARGET_OFFSET_SECONDS: i32 = 5 * 3600 + 30 * 60;

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Naive textual layouts accepted after the offset-carrying forms, assumed UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

fn target_offset() -> FixedOffset {
    FixedOffset::east_opt(TARGET_OFFSET_SECONDS).unwrap()
}

/// Parse one raw timestamp string as a UTC instant.
///
/// Accepts RFC 3339 (`2025-06-01T01:00:00Z`, `...+00:00`), numeric offsets
/// without a colon (`...+0530`), and naive datetimes with or without
/// fractional seconds (assumed UTC).
///
/// # Returns
///
/// The UTC instant, or `None` when no layout matches.
pub fn parse_timestamp_utc(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Read a raw timestamp column as UTC epoch milliseconds.
///
/// String columns are parsed row by row; datetime columns are consumed at
/// their stored precision. Any other dtype yields all nulls, which the
/// validation engine reports as unparsable rows.
pub fn timestamps_as_utc_millis(column: &Column) -> Result<Vec<Option<i64>>> {
    match column.dtype() {
        DataType::String => {
            let ca = column.str()?;
            let mut parsed = Vec::with_capacity(ca.len());
            for i in 0..ca.len() {
                parsed.push(
                    ca.get(i)
                        .and_then(parse_timestamp_utc)
                        .map(|dt| dt.timestamp_millis()),
                );
            }
            Ok(parsed)
        }
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            let physical = column.cast(&DataType::Int64)?;
            let ca = physical.i64()?;
            let mut parsed = Vec::with_capacity(ca.len());
            for i in 0..ca.len() {
                parsed.push(ca.get(i).map(|v| match unit {
                    TimeUnit::Nanoseconds => v / 1_000_000,
                    TimeUnit::Microseconds => v / 1_000,
                    TimeUnit::Milliseconds => v,
                }));
            }
            Ok(parsed)
        }
        _ => Ok(vec![None; column.len()]),
    }
}

/// Normalize the raw `timestamp` column into the target timezone.
///
/// Appends four columns derived from the same instant:
/// `timestamp_normalized` (wall-clock datetime in UTC+05:30),
/// `timestamp_iso` (ISO-8601 text with the numeric offset suffix),
/// `date` (`YYYY-MM-DD` string), and `hour` (wall time floored to the
/// top of the hour).
///
/// # Errors
///
/// Returns an error only if the `timestamp` column is missing. Null or
/// unparsable timestamps produce null derived values.
pub fn normalize_timestamps(df: &DataFrame) -> Result<DataFrame> {
    let utc_millis = timestamps_as_utc_millis(df.column("timestamp")?)?;
    let offset = target_offset();

    let mut normalized: Vec<Option<i64>> = Vec::with_capacity(utc_millis.len());
    let mut iso: Vec<Option<String>> = Vec::with_capacity(utc_millis.len());
    let mut dates: Vec<Option<String>> = Vec::with_capacity(utc_millis.len());
    let mut hours: Vec<Option<i64>> = Vec::with_capacity(utc_millis.len());

    for entry in &utc_millis {
        let local = entry
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.with_timezone(&offset));

        match local {
            Some(dt) => {
                let wall_millis = dt.naive_local().and_utc().timestamp_millis();
                normalized.push(Some(wall_millis));
                iso.push(Some(dt.format("%Y-%m-%dT%H:%M:%S%z").to_string()));
                dates.push(Some(dt.format("%Y-%m-%d").to_string()));
                hours.push(Some(wall_millis - wall_millis.rem_euclid(MILLIS_PER_HOUR)));
            }
            None => {
                normalized.push(None);
                iso.push(None);
                dates.push(None);
                hours.push(None);
            }
        }
    }

    let mut out = df.clone();
    out.with_column(
        Series::new("timestamp_normalized".into(), normalized)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
    )?;
    out.with_column(Series::new("timestamp_iso".into(), iso))?;
    out.with_column(Series::new("date".into(), dates))?;
    out.with_column(
        Series::new("hour".into(), hours)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
    )?;

    Ok(out)
}
