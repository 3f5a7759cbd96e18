//! Daily and rolling aggregation of corrected values.
//!
//! Both passes follow the same reduce-then-re-expand shape: compute one
//! aggregate row per group key with the query engine, read the result into
//! an indexed map, and broadcast it back over the original rows so every
//! reading carries its group's aggregate.

use std::collections::{BTreeMap, HashMap, VecDeque};

use polars::prelude::*;

use crate::processors::Result;

/// Window length of the trailing rolling mean, in series entries.
const ROLLING_WINDOW: usize = 7;

type GroupKey = (String, String, String);

fn row_keys(df: &DataFrame) -> Result<Vec<Option<GroupKey>>> {
    let sensors = df.column("sensor_id")?.str()?;
    let types = df.column("reading_type")?.str()?;
    let dates = df.column("date")?.str()?;

    let mut keys = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        keys.push(match (sensors.get(i), types.get(i), dates.get(i)) {
            (Some(s), Some(t), Some(d)) => Some((s.to_string(), t.to_string(), d.to_string())),
            _ => None,
        });
    }
    Ok(keys)
}

/// Compute the per-(sensor, type, date) mean of `value_corrected`.
///
/// Appends `daily_avg`, identical for every row sharing the group key.
/// Rows with a null `date` (unparsable timestamps) keep a null average.
///
/// # Errors
///
/// Returns an error if `sensor_id`, `reading_type`, `date` or
/// `value_corrected` is missing.
pub fn add_daily_average(df: &DataFrame) -> Result<DataFrame> {
    let reduced = df
        .clone()
        .lazy()
        .filter(col("date").is_not_null())
        .group_by([col("sensor_id"), col("reading_type"), col("date")])
        .agg([col("value_corrected").mean().alias("daily_avg")])
        .collect()?;

    let sensors = reduced.column("sensor_id")?.str()?;
    let types = reduced.column("reading_type")?.str()?;
    let dates = reduced.column("date")?.str()?;
    let averages = reduced.column("daily_avg")?.f64()?;

    let mut by_key: HashMap<GroupKey, Option<f64>> = HashMap::with_capacity(reduced.height());
    for i in 0..reduced.height() {
        if let (Some(s), Some(t), Some(d)) = (sensors.get(i), types.get(i), dates.get(i)) {
            by_key.insert((s.to_string(), t.to_string(), d.to_string()), averages.get(i));
        }
    }

    let broadcast: Vec<Option<f64>> = row_keys(df)?
        .into_iter()
        .map(|key| key.and_then(|k| by_key.get(&k).copied().flatten()))
        .collect();

    let mut out = df.clone();
    out.with_column(Series::new("daily_avg".into(), broadcast))?;
    Ok(out)
}

/// Compute the trailing rolling mean of `daily_avg` per series.
///
/// One entry per distinct (sensor, type, date), ordered by date within
/// each (sensor, type) series; the window covers the current entry plus
/// up to 6 preceding *entries present in the series*, not calendar days,
/// with a minimum of one entry (no warm-up nulls). The result is
/// broadcast back to every row sharing the (sensor, type, date) key.
///
/// Expects `daily_avg` to be present, so it must run after
/// [`add_daily_average`].
pub fn add_rolling_mean(df: &DataFrame) -> Result<DataFrame> {
    let averages = df.column("daily_avg")?.cast(&DataType::Float64)?;
    let averages = averages.f64()?;
    let keys = row_keys(df)?;

    // Distinct daily entries, date-ordered per series. YYYY-MM-DD dates
    // sort correctly as strings.
    let mut series: BTreeMap<(String, String), BTreeMap<String, Option<f64>>> = BTreeMap::new();
    for (i, key) in keys.iter().enumerate() {
        if let Some((sensor, reading_type, date)) = key {
            series
                .entry((sensor.clone(), reading_type.clone()))
                .or_default()
                .entry(date.clone())
                .or_insert_with(|| averages.get(i));
        }
    }

    let mut rolling: HashMap<GroupKey, Option<f64>> = HashMap::new();
    for ((sensor, reading_type), entries) in &series {
        let mut window: VecDeque<Option<f64>> = VecDeque::with_capacity(ROLLING_WINDOW);
        for (date, daily) in entries {
            window.push_back(*daily);
            if window.len() > ROLLING_WINDOW {
                window.pop_front();
            }
            let present: Vec<f64> = window.iter().filter_map(|v| *v).collect();
            let mean = if present.is_empty() {
                None
            } else {
                Some(present.iter().sum::<f64>() / present.len() as f64)
            };
            rolling.insert((sensor.clone(), reading_type.clone(), date.clone()), mean);
        }
    }

    let broadcast: Vec<Option<f64>> = keys
        .into_iter()
        .map(|key| key.and_then(|k| rolling.get(&k).copied().flatten()))
        .collect();

    let mut out = df.clone();
    out.with_column(Series::new("rolling_7d".into(), broadcast))?;
    Ok(out)
}

/// Run both aggregation passes in order.
pub fn add_aggregates(df: &DataFrame) -> Result<DataFrame> {
    let with_daily = add_daily_average(df)?;
    add_rolling_mean(&with_daily)
}
