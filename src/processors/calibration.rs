//! Calibration and anomaly flagging over calibrated values.
//!
//! Both stages are single columnar passes keyed by a per-reading-type
//! lookup table from [`PipelineConfig`](crate::config::PipelineConfig).

use std::collections::HashMap;

use polars::prelude::*;

use crate::config::{Calibration, ValueRange};
use crate::processors::Result;

/// Apply per-reading-type linear calibration to raw values.
///
/// Appends `value_calibrated = value * multiplier + offset`, looking up
/// the parameters by `reading_type`. Types absent from the table use the
/// identity calibration (multiplier 1.0, offset 0.0). A null `value`
/// calibrates to null.
///
/// # Errors
///
/// Returns an error if the `reading_type` or `value` column is missing
/// or has an unexpected dtype.
pub fn apply_calibration(
    df: &DataFrame,
    table: &HashMap<String, Calibration>,
) -> Result<DataFrame> {
    let types = df.column("reading_type")?.str()?;
    let values = df.column("value")?.cast(&DataType::Float64)?;
    let values = values.f64()?;

    let mut calibrated: Vec<Option<f64>> = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let params = types
            .get(i)
            .and_then(|t| table.get(t).copied())
            .unwrap_or_default();
        calibrated.push(values.get(i).map(|v| v * params.multiplier + params.offset));
    }

    let mut out = df.clone();
    out.with_column(Series::new("value_calibrated".into(), calibrated))?;
    Ok(out)
}

/// Flag readings whose calibrated value falls outside the expected range.
///
/// Appends a boolean `anomalous_reading` column. A row is anomalous iff
/// its type has a configured range and `value_calibrated` is non-null and
/// strictly outside `[min, max]`. The flag is advisory; it never feeds
/// into `value_corrected`.
///
/// # Errors
///
/// Returns an error if `reading_type` or `value_calibrated` is missing.
pub fn flag_anomalies(df: &DataFrame, ranges: &HashMap<String, ValueRange>) -> Result<DataFrame> {
    let types = df.column("reading_type")?.str()?;
    let values = df.column("value_calibrated")?.cast(&DataType::Float64)?;
    let values = values.f64()?;

    let mut flags: Vec<bool> = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let range = types.get(i).and_then(|t| ranges.get(t));
        let flag = match (range, values.get(i)) {
            (Some(r), Some(v)) => v < r.min || v > r.max,
            _ => false,
        };
        flags.push(flag);
    }

    let mut out = df.clone();
    out.with_column(Series::new("anomalous_reading".into(), flags))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use polars::df;

    fn calibrated_values(df: &DataFrame) -> Vec<Option<f64>> {
        df.column("value_calibrated")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_temperature_calibration_round_trip() {
        let config = PipelineConfig::default();
        let frame = df!(
            "reading_type" => ["temperature"],
            "value" => [25.0],
        )
        .unwrap();

        let out = apply_calibration(&frame, &config.calibration).unwrap();
        let calibrated = calibrated_values(&out);
        assert!((calibrated[0].unwrap() - 25.05).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_type_uses_identity() {
        let config = PipelineConfig::default();
        let frame = df!(
            "reading_type" => ["wind_speed"],
            "value" => [12.5],
        )
        .unwrap();

        let out = apply_calibration(&frame, &config.calibration).unwrap();
        assert_eq!(calibrated_values(&out)[0], Some(12.5));
    }

    #[test]
    fn test_null_value_calibrates_to_null() {
        let config = PipelineConfig::default();
        let frame = df!(
            "reading_type" => ["humidity", "humidity"],
            "value" => [Some(40.0), None],
        )
        .unwrap();

        let out = apply_calibration(&frame, &config.calibration).unwrap();
        let calibrated = calibrated_values(&out);
        assert_eq!(calibrated[0], Some(40.0));
        assert_eq!(calibrated[1], None);
    }

    #[test]
    fn test_anomaly_iff_outside_range() {
        let config = PipelineConfig::default();
        let frame = df!(
            "reading_type" => ["temperature", "temperature", "temperature", "temperature"],
            "value_calibrated" => [-50.0, -10.0, 60.0, 120.0],
        )
        .unwrap();

        let out = flag_anomalies(&frame, &config.expected_ranges).unwrap();
        let flags: Vec<Option<bool>> = out
            .column("anomalous_reading")
            .unwrap()
            .bool()
            .unwrap()
            .into_iter()
            .collect();

        // Range bounds are inclusive.
        assert_eq!(flags, vec![Some(true), Some(false), Some(false), Some(true)]);
    }

    #[test]
    fn test_type_without_range_is_never_anomalous() {
        let config = PipelineConfig::default();
        let frame = df!(
            "reading_type" => ["wind_speed"],
            "value_calibrated" => [1e9],
        )
        .unwrap();

        let out = flag_anomalies(&frame, &config.expected_ranges).unwrap();
        assert_eq!(out.column("anomalous_reading").unwrap().bool().unwrap().get(0), Some(false));
    }

    #[test]
    fn test_null_calibrated_value_is_not_anomalous() {
        let config = PipelineConfig::default();
        let frame = df!(
            "reading_type" => ["humidity"],
            "value_calibrated" => [Option::<f64>::None],
        )
        .unwrap();

        let out = flag_anomalies(&frame, &config.expected_ranges).unwrap();
        assert_eq!(out.column("anomalous_reading").unwrap().bool().unwrap().get(0), Some(false));
    }
}
