//! Partitioned parquet storage for the transformed dataset.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use log::{info, warn};
use polars::prelude::*;
use thiserror::Error;

/// Columns the storage layer partitions on.
const PARTITION_COLUMNS: [&str; 3] = ["date", "sensor_id", "reading_type"];

/// Errors that can occur while storing the transformed dataset.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("missing partition column: {0}")]
    MissingColumn(String),

    #[error("dataframe operation failed: {0}")]
    Polars(#[from] PolarsError),

    #[error("failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

fn first_string(shard: &DataFrame, column: &str) -> Result<Option<String>> {
    Ok(shard.column(column)?.str()?.get(0).map(|s| s.to_string()))
}

/// Write the transformed dataset as partitioned, snappy-compressed parquet.
///
/// Layout: `<processed_dir>/date=<date>/sensor_id=<sensor>/<type>.parquet`,
/// one shard per distinct (date, sensor, reading type), every column
/// retained. Shards whose partition key is null (rows with unparsable
/// timestamps) are skipped with a warning. An empty dataset writes
/// nothing.
///
/// # Errors
///
/// Returns an error if a partition column is missing or a shard cannot
/// be written.
pub fn store_partitioned(df: &DataFrame, processed_dir: &Path) -> Result<Vec<PathBuf>> {
    if df.height() == 0 {
        warn!("empty dataset, nothing to store");
        return Ok(Vec::new());
    }
    for name in PARTITION_COLUMNS {
        if df.column(name).is_err() {
            return Err(StoreError::MissingColumn(name.to_string()));
        }
    }

    let mut written = Vec::new();
    for mut shard in df.partition_by_stable(PARTITION_COLUMNS, true)? {
        let date = first_string(&shard, "date")?;
        let sensor = first_string(&shard, "sensor_id")?;
        let reading_type = first_string(&shard, "reading_type")?;

        let (Some(date), Some(sensor), Some(reading_type)) = (date, sensor, reading_type) else {
            warn!("skipping shard with null partition key ({} rows)", shard.height());
            continue;
        };

        let dir = processed_dir
            .join(format!("date={}", date))
            .join(format!("sensor_id={}", sensor));
        fs::create_dir_all(&dir).map_err(|e| StoreError::CreateDirectory {
            path: dir.display().to_string(),
            source: e,
        })?;

        let path = dir.join(format!("{}.parquet", reading_type));
        let file = File::create(&path).map_err(|e| StoreError::CreateFile {
            path: path.display().to_string(),
            source: e,
        })?;
        ParquetWriter::new(file)
            .with_compression(ParquetCompression::Snappy)
            .finish(&mut shard)?;
        written.push(path);
    }

    info!(
        "stored {} partitions under {}",
        written.len(),
        processed_dir.display()
    );
    Ok(written)
}
