//! Statistical outlier correction via per-reading-type z-scores.
//!
//! Correction clips rather than removes: every input row survives with a
//! `value_corrected` pulled inside the ±3σ band of its group. The group
//! statistics are computed once over the whole batch, so a single extreme
//! reading inflates its own group's mean and deviation and weakens the
//! clip. That two-pass semantic is intentional and kept as-is.

use std::collections::HashMap;

use polars::prelude::*;

use crate::processors::Result;

/// Minimum group size for meaningful z-scores.
const MIN_GROUP_SIZE: u32 = 3;

/// Per-group population statistics read back from the grouped reduce.
struct GroupStats {
    mean: f64,
    std: f64,
    size: u32,
}

impl GroupStats {
    /// Zero variance or an under-populated group degrades the stage to a
    /// no-op instead of dividing by zero.
    fn is_degenerate(&self) -> bool {
        self.std == 0.0 || self.size < MIN_GROUP_SIZE
    }
}

fn group_stats(df: &DataFrame) -> Result<HashMap<String, GroupStats>> {
    let reduced = df
        .clone()
        .lazy()
        .group_by([col("reading_type")])
        .agg([
            col("value_calibrated").mean().alias("mean"),
            col("value_calibrated").std(0).alias("std"),
            col("value_calibrated").len().alias("n"),
        ])
        .collect()?;

    let types = reduced.column("reading_type")?.str()?;
    let means = reduced.column("mean")?.f64()?;
    let stds = reduced.column("std")?.f64()?;
    let sizes = reduced.column("n")?.cast(&DataType::UInt32)?;
    let sizes = sizes.u32()?;

    let mut stats = HashMap::with_capacity(reduced.height());
    for i in 0..reduced.height() {
        let (Some(reading_type), Some(size)) = (types.get(i), sizes.get(i)) else {
            continue;
        };
        // An all-null group has no statistics and never clips.
        let (Some(mean), Some(std)) = (means.get(i), stds.get(i)) else {
            stats.insert(
                reading_type.to_string(),
                GroupStats { mean: 0.0, std: 0.0, size },
            );
            continue;
        };
        stats.insert(reading_type.to_string(), GroupStats { mean, std, size });
    }
    Ok(stats)
}

/// Detect and correct statistical outliers per reading type.
///
/// Appends two columns:
/// - `zscore`: `(value_calibrated - mean) / std` with population standard
///   deviation (ddof = 0), or 0.0 for every member of a group with zero
///   variance or fewer than 3 members.
/// - `value_corrected`: `value_calibrated` clipped to the closed interval
///   `[mean - 3*std, mean + 3*std]`, or unchanged for degenerate groups.
///
/// # Errors
///
/// Returns an error if `reading_type` or `value_calibrated` is missing.
pub fn correct_outliers(df: &DataFrame) -> Result<DataFrame> {
    let stats = group_stats(df)?;

    let types = df.column("reading_type")?.str()?;
    let values = df.column("value_calibrated")?.cast(&DataType::Float64)?;
    let values = values.f64()?;

    let mut zscores: Vec<Option<f64>> = Vec::with_capacity(df.height());
    let mut corrected: Vec<Option<f64>> = Vec::with_capacity(df.height());

    for i in 0..df.height() {
        let group = types.get(i).and_then(|t| stats.get(t));
        let value = values.get(i);

        match group {
            Some(g) if g.is_degenerate() => {
                zscores.push(Some(0.0));
                corrected.push(value);
            }
            Some(g) => {
                let lo = g.mean - 3.0 * g.std;
                let hi = g.mean + 3.0 * g.std;
                zscores.push(value.map(|v| (v - g.mean) / g.std));
                corrected.push(value.map(|v| v.clamp(lo, hi)));
            }
            // No group stats means the key itself was null.
            None => {
                zscores.push(Some(0.0));
                corrected.push(value);
            }
        }
    }

    let mut out = df.clone();
    out.with_column(Series::new("zscore".into(), zscores))?;
    out.with_column(Series::new("value_corrected".into(), corrected))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    fn column_f64(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        df.column(name).unwrap().f64().unwrap().into_iter().collect()
    }

    #[test]
    fn test_small_group_is_a_no_op() {
        let frame = df!(
            "reading_type" => ["temperature", "temperature"],
            "value_calibrated" => [10.0, 1000.0],
        )
        .unwrap();

        let out = correct_outliers(&frame).unwrap();
        assert_eq!(column_f64(&out, "zscore"), vec![Some(0.0), Some(0.0)]);
        assert_eq!(column_f64(&out, "value_corrected"), vec![Some(10.0), Some(1000.0)]);
    }

    #[test]
    fn test_zero_variance_group_is_a_no_op() {
        let frame = df!(
            "reading_type" => ["humidity", "humidity", "humidity", "humidity"],
            "value_calibrated" => [55.0, 55.0, 55.0, 55.0],
        )
        .unwrap();

        let out = correct_outliers(&frame).unwrap();
        assert_eq!(column_f64(&out, "zscore"), vec![Some(0.0); 4]);
        assert_eq!(column_f64(&out, "value_corrected"), vec![Some(55.0); 4]);
    }

    #[test]
    fn test_outlier_is_clipped_not_dropped() {
        let values = vec![20.0, 21.0, 19.0, 20.5, 19.5, 20.0, 21.5, 19.0, 20.0, 500.0];
        let frame = df!(
            "reading_type" => vec!["temperature"; values.len()],
            "value_calibrated" => values.clone(),
        )
        .unwrap();

        let out = correct_outliers(&frame).unwrap();
        assert_eq!(out.height(), values.len());

        let n = values.len() as f64;
        let mean: f64 = values.iter().sum::<f64>() / n;
        let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        let hi = mean + 3.0 * std;
        let lo = mean - 3.0 * std;

        let corrected = column_f64(&out, "value_corrected");
        for v in &corrected {
            let v = v.unwrap();
            assert!(v >= lo && v <= hi);
        }
        // The extreme reading lands exactly on the upper clip bound.
        assert!((corrected[9].unwrap() - hi).abs() < 1e-9);
        // In-band readings pass through unchanged.
        assert_eq!(corrected[0], Some(20.0));
    }

    #[test]
    fn test_zscore_matches_population_statistics() {
        let frame = df!(
            "reading_type" => ["soil_moisture", "soil_moisture", "soil_moisture"],
            "value_calibrated" => [0.2, 0.4, 0.6],
        )
        .unwrap();

        let out = correct_outliers(&frame).unwrap();
        let zscores = column_f64(&out, "zscore");

        // mean 0.4, population std sqrt(0.08/3)
        let std = (0.08f64 / 3.0).sqrt();
        assert!((zscores[0].unwrap() - (-0.2 / std)).abs() < 1e-9);
        assert!((zscores[1].unwrap()).abs() < 1e-9);
        assert!((zscores[2].unwrap() - (0.2 / std)).abs() < 1e-9);
    }

    #[test]
    fn test_groups_are_independent() {
        let frame = df!(
            "reading_type" => ["temperature", "temperature", "temperature", "humidity"],
            "value_calibrated" => [20.0, 21.0, 22.0, 9999.0],
        )
        .unwrap();

        let out = correct_outliers(&frame).unwrap();
        let corrected = column_f64(&out, "value_corrected");

        // The lone humidity reading sits in a degenerate group of its own.
        assert_eq!(corrected[3], Some(9999.0));
    }
}
