//! Pipeline boundary I/O: ingestion, storage and sample data.

pub mod generator;
pub mod ingest;
pub mod store;

pub use generator::{generate_sample_data, GeneratorError};
pub use ingest::{ingest_raw_dir, Checkpoint, IngestError, IngestOutcome};
pub use store::{store_partitioned, StoreError};
