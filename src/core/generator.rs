//! Seeded synthetic sensor data for exercising the pipeline end to end.
//!
//! Emits one raw parquet file per day with per-sensor, per-hour readings
//! of the four reading types, including injected nulls and out-of-range
//! extremes so the downstream cleaning stages have something to do.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use log::info;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::config::GeneratorConfig;

/// Plausible value band per reading type.
const RAW_BANDS: [(&str, f64, f64); 4] = [
    ("temperature", 15.0, 40.0),
    ("humidity", 20.0, 90.0),
    ("soil_moisture", 0.0, 1.0),
    ("light_intensity", 100.0, 1000.0),
];

/// Probability of a null value or battery reading.
const NULL_RATE: f64 = 0.05;

/// Probability of an injected out-of-range extreme.
const EXTREME_RATE: f64 = 0.05;

fn extreme_pool(reading_type: &str) -> &'static [f64] {
    match reading_type {
        "temperature" => &[-50.0, 120.0],
        "humidity" => &[-10.0, 150.0],
        "soil_moisture" => &[-0.05, 2.0],
        "light_intensity" => &[-100.0, 5000.0],
        _ => &[],
    }
}

/// Errors that can occur during sample data generation.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dataframe operation failed: {0}")]
    Polars(#[from] PolarsError),
}

/// Result type for generator operations.
pub type Result<T> = std::result::Result<T, GeneratorError>;

fn generate_day(date: NaiveDate, num_sensors: u32, rng: &mut StdRng) -> Result<DataFrame> {
    let capacity = (num_sensors as usize) * 24 * RAW_BANDS.len();
    let mut sensor_ids: Vec<String> = Vec::with_capacity(capacity);
    let mut timestamps: Vec<i64> = Vec::with_capacity(capacity);
    let mut reading_types: Vec<&str> = Vec::with_capacity(capacity);
    let mut values: Vec<Option<f64>> = Vec::with_capacity(capacity);
    let mut batteries: Vec<Option<f64>> = Vec::with_capacity(capacity);

    let midnight = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
    for sensor in 1..=num_sensors {
        for hour in 0..24i64 {
            for (reading_type, lo, hi) in RAW_BANDS {
                let minute = rng.gen_range(0..60i64);
                let instant = midnight + Duration::hours(hour) + Duration::minutes(minute);

                let mut value = Some(rng.gen_range(lo..hi));
                if rng.gen::<f64>() < NULL_RATE {
                    value = None;
                } else if rng.gen::<f64>() < EXTREME_RATE {
                    let pool = extreme_pool(reading_type);
                    value = Some(pool[rng.gen_range(0..pool.len())]);
                }

                let mut battery = Some(rng.gen_range(20.0..100.0));
                if rng.gen::<f64>() < NULL_RATE {
                    battery = None;
                }

                sensor_ids.push(format!("sensor_{}", sensor));
                timestamps.push(instant.timestamp_millis());
                reading_types.push(reading_type);
                values.push(value);
                batteries.push(battery);
            }
        }
    }

    let mut df = df!(
        "sensor_id" => sensor_ids,
        "timestamp" => timestamps,
        "reading_type" => reading_types,
        "value" => values,
        "battery_level" => batteries,
    )?;
    let ts = df
        .column("timestamp")?
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    df.with_column(ts)?;
    Ok(df)
}

/// Generate seeded raw sample data, one parquet file per day.
///
/// Files are named `YYYY-MM-DD.parquet` and written under `output_dir`
/// (created if absent). The same [`GeneratorConfig`] always produces the
/// same files.
///
/// # Errors
///
/// Returns an error if the output directory or a file cannot be written.
pub fn generate_sample_data(output_dir: &Path, config: &GeneratorConfig) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut written = Vec::with_capacity(config.days as usize);
    for day in 0..config.days {
        let date = config.start_date + Duration::days(day as i64);
        let mut df = generate_day(date, config.num_sensors, &mut rng)?;

        let path = output_dir.join(format!("{}.parquet", date.format("%Y-%m-%d")));
        let file = File::create(&path)?;
        ParquetWriter::new(file).finish(&mut df)?;
        info!("generated {} with {} rows", path.display(), df.height());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config() -> GeneratorConfig {
        GeneratorConfig {
            num_sensors: 2,
            days: 2,
            start_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            seed: 7,
        }
    }

    fn read_parquet(path: &Path) -> DataFrame {
        ParquetReader::new(File::open(path).unwrap()).finish().unwrap()
    }

    #[test]
    fn test_one_file_per_day_with_date_names() {
        let dir = TempDir::new().unwrap();
        let written = generate_sample_data(dir.path(), &create_test_config()).unwrap();

        assert_eq!(written.len(), 2);
        assert!(dir.path().join("2025-07-01.parquet").exists());
        assert!(dir.path().join("2025-07-02.parquet").exists());
    }

    #[test]
    fn test_day_file_shape() {
        let dir = TempDir::new().unwrap();
        let written = generate_sample_data(dir.path(), &create_test_config()).unwrap();

        let df = read_parquet(&written[0]);
        // 2 sensors x 24 hours x 4 reading types
        assert_eq!(df.height(), 2 * 24 * 4);
        assert_eq!(df.width(), 5);
        assert!(matches!(
            df.column("timestamp").unwrap().dtype(),
            DataType::Datetime(TimeUnit::Milliseconds, _)
        ));
    }

    #[test]
    fn test_generation_is_deterministic_under_a_seed() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        let config = create_test_config();

        let a = generate_sample_data(dir_a.path(), &config).unwrap();
        let b = generate_sample_data(dir_b.path(), &config).unwrap();

        assert_eq!(read_parquet(&a[0]), read_parquet(&b[0]));
        assert_eq!(read_parquet(&a[1]), read_parquet(&b[1]));
    }

    #[test]
    fn test_values_come_from_band_or_extreme_pool() {
        let dir = TempDir::new().unwrap();
        let written = generate_sample_data(dir.path(), &create_test_config()).unwrap();

        let df = read_parquet(&written[0]);
        let types = df.column("reading_type").unwrap();
        let types = types.str().unwrap();
        let values = df.column("value").unwrap();
        let values = values.f64().unwrap();

        for i in 0..df.height() {
            let (Some(reading_type), Some(value)) = (types.get(i), values.get(i)) else {
                continue;
            };
            let (_, lo, hi) = RAW_BANDS
                .iter()
                .find(|(t, _, _)| *t == reading_type)
                .copied()
                .unwrap();
            let in_band = value >= lo && value < hi;
            let in_pool = extreme_pool(reading_type).contains(&value);
            assert!(in_band || in_pool, "{reading_type} value {value} out of place");
        }
    }
}
