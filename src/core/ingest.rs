//! Checkpointed ingestion of raw parquet batch files.
//!
//! Discovers per-day parquet files in a raw directory, skips files already
//! recorded in the JSON checkpoint, validates each file's column set,
//! stamps a `source_file` column and concatenates everything into one
//! working dataset. Corrupt or mis-shaped files are logged and counted,
//! never fatal; they stay out of the checkpoint so the next run retries
//! them.

use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use log::{error, info};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Column set every raw batch file must carry.
pub const EXPECTED_COLUMNS: [&str; 5] = [
    "sensor_id",
    "timestamp",
    "reading_type",
    "value",
    "battery_level",
];

/// Errors that can occur during ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dataframe operation failed: {0}")]
    Polars(#[from] PolarsError),

    #[error("checkpoint serialization error: {0}")]
    Checkpoint(#[from] serde_json::Error),
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// JSON record of raw files already consumed by previous runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub processed_files: Vec<String>,
}

impl Checkpoint {
    /// Load the checkpoint, treating a missing file as an empty state.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Persist the checkpoint, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Outcome of one ingestion pass.
#[derive(Debug)]
pub struct IngestOutcome {
    /// Combined dataset of all newly ingested files; empty if none.
    pub data: DataFrame,
    /// Files read successfully this run.
    pub files_read: usize,
    /// Files skipped because the checkpoint already records them.
    pub files_skipped: usize,
    /// Files rejected as unreadable or mis-shaped.
    pub files_failed: usize,
}

fn discover_parquet_files(raw_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(raw_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("parquet"))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

fn read_batch_file(path: &Path, filename: &str) -> Result<DataFrame> {
    let file = File::open(path)?;
    let df = ParquetReader::new(file).finish()?;

    let actual: HashSet<String> = df
        .get_column_names_str()
        .iter()
        .map(|name| name.to_lowercase())
        .collect();
    let expected: HashSet<String> = EXPECTED_COLUMNS.iter().map(|c| c.to_string()).collect();
    if actual != expected {
        return Err(IngestError::Polars(PolarsError::SchemaMismatch(
            format!(
                "schema mismatch in {}: expected {:?}, got {:?}",
                filename, expected, actual
            )
            .into(),
        )));
    }

    // Normalize column order across files before concatenation.
    let mut df = df.select(EXPECTED_COLUMNS)?;
    df.with_column(Series::new(
        "source_file".into(),
        vec![filename.to_string(); df.height()],
    ))?;
    Ok(df)
}

/// Ingest new parquet files from a raw directory.
///
/// Already-checkpointed files are skipped; files that fail to read or
/// validate are logged, counted and retried on the next run. The
/// checkpoint is saved once at the end. No new files yields an empty
/// dataset, not an error.
///
/// # Errors
///
/// Returns an error only for failures outside the per-file tolerance:
/// an unreadable raw directory, a corrupt checkpoint, or a failure to
/// save the checkpoint.
pub fn ingest_raw_dir(raw_dir: &Path, checkpoint_path: &Path) -> Result<IngestOutcome> {
    let mut checkpoint = Checkpoint::load(checkpoint_path)?;
    let processed: HashSet<String> = checkpoint.processed_files.iter().cloned().collect();

    let mut combined: Option<DataFrame> = None;
    let mut files_read = 0;
    let mut files_skipped = 0;
    let mut files_failed = 0;

    for path in discover_parquet_files(raw_dir)? {
        let filename = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => continue,
        };

        if processed.contains(&filename) {
            info!("skipping {} (already processed)", filename);
            files_skipped += 1;
            continue;
        }

        let df = match read_batch_file(&path, &filename) {
            Ok(df) => df,
            Err(e) => {
                error!("failed to ingest {}: {}", filename, e);
                files_failed += 1;
                continue;
            }
        };

        info!(
            "{}: {} rows, {} null values, {} null battery readings",
            filename,
            df.height(),
            df.column("value")?.null_count(),
            df.column("battery_level")?.null_count(),
        );

        match combined.as_mut() {
            Some(all) => {
                all.vstack_mut(&df)?;
            }
            None => combined = Some(df),
        }
        files_read += 1;
        checkpoint.processed_files.push(filename);
    }

    checkpoint.save(checkpoint_path)?;

    let data = combined.unwrap_or_else(DataFrame::empty);
    info!(
        "ingestion summary: files_read={}, files_skipped={}, files_failed={}, records_total={}",
        files_read,
        files_skipped,
        files_failed,
        data.height()
    );

    Ok(IngestOutcome {
        data,
        files_read,
        files_skipped,
        files_failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;
    use std::io::Write as IoWrite;
    use tempfile::TempDir;

    fn create_batch_file(dir: &Path, name: &str, sensor: &str) -> PathBuf {
        let mut frame = df!(
            "sensor_id" => [sensor, sensor],
            "timestamp" => ["2025-07-01T00:00:00", "2025-07-01T01:00:00"],
            "reading_type" => ["temperature", "humidity"],
            "value" => [Some(20.0), None],
            "battery_level" => [80.0, 81.0],
        )
        .unwrap();
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        ParquetWriter::new(file).finish(&mut frame).unwrap();
        path
    }

    #[test]
    fn test_ingest_reads_and_stamps_source_file() {
        let dir = TempDir::new().unwrap();
        create_batch_file(dir.path(), "2025-07-01.parquet", "s1");
        let checkpoint = dir.path().join(".checkpoint.json");

        let outcome = ingest_raw_dir(dir.path(), &checkpoint).unwrap();
        assert_eq!(outcome.files_read, 1);
        assert_eq!(outcome.data.height(), 2);

        let sources = outcome.data.column("source_file").unwrap();
        assert_eq!(sources.str().unwrap().get(0), Some("2025-07-01.parquet"));
    }

    #[test]
    fn test_checkpointed_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        create_batch_file(dir.path(), "2025-07-01.parquet", "s1");
        let checkpoint = dir.path().join(".checkpoint.json");

        let first = ingest_raw_dir(dir.path(), &checkpoint).unwrap();
        assert_eq!(first.files_read, 1);

        let second = ingest_raw_dir(dir.path(), &checkpoint).unwrap();
        assert_eq!(second.files_read, 0);
        assert_eq!(second.files_skipped, 1);
        assert_eq!(second.data.height(), 0);
    }

    #[test]
    fn test_new_files_are_picked_up_incrementally() {
        let dir = TempDir::new().unwrap();
        create_batch_file(dir.path(), "2025-07-01.parquet", "s1");
        let checkpoint = dir.path().join(".checkpoint.json");
        ingest_raw_dir(dir.path(), &checkpoint).unwrap();

        create_batch_file(dir.path(), "2025-07-02.parquet", "s2");
        let outcome = ingest_raw_dir(dir.path(), &checkpoint).unwrap();
        assert_eq!(outcome.files_read, 1);
        assert_eq!(outcome.files_skipped, 1);
        assert_eq!(
            outcome.data.column("sensor_id").unwrap().str().unwrap().get(0),
            Some("s2")
        );
    }

    #[test]
    fn test_corrupt_file_is_counted_and_skipped() {
        let dir = TempDir::new().unwrap();
        create_batch_file(dir.path(), "good.parquet", "s1");
        let mut bad = File::create(dir.path().join("bad.parquet")).unwrap();
        bad.write_all(b"this is not parquet").unwrap();
        let checkpoint = dir.path().join(".checkpoint.json");

        let outcome = ingest_raw_dir(dir.path(), &checkpoint).unwrap();
        assert_eq!(outcome.files_read, 1);
        assert_eq!(outcome.files_failed, 1);
        assert_eq!(outcome.data.height(), 2);

        // Failed files must stay out of the checkpoint for retry.
        let state = Checkpoint::load(&checkpoint).unwrap();
        assert!(!state.processed_files.contains(&"bad.parquet".to_string()));
        assert!(state.processed_files.contains(&"good.parquet".to_string()));
    }

    #[test]
    fn test_schema_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut frame = df!(
            "sensor_id" => ["s1"],
            "temperature" => [20.0],
        )
        .unwrap();
        let file = File::create(dir.path().join("wrong.parquet")).unwrap();
        ParquetWriter::new(file).finish(&mut frame).unwrap();
        let checkpoint = dir.path().join(".checkpoint.json");

        let outcome = ingest_raw_dir(dir.path(), &checkpoint).unwrap();
        assert_eq!(outcome.files_read, 0);
        assert_eq!(outcome.files_failed, 1);
        assert_eq!(outcome.data.height(), 0);
    }

    #[test]
    fn test_empty_directory_yields_empty_dataset() {
        let dir = TempDir::new().unwrap();
        let checkpoint = dir.path().join(".checkpoint.json");

        let outcome = ingest_raw_dir(dir.path(), &checkpoint).unwrap();
        assert_eq!(outcome.files_read, 0);
        assert_eq!(outcome.data.height(), 0);
        assert!(checkpoint.exists());
    }

    #[test]
    fn test_missing_checkpoint_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let state = Checkpoint::load(&dir.path().join("nope.json")).unwrap();
        assert!(state.processed_files.is_empty());
    }
}
