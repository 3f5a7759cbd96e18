//! Command-line interface for the telemetry pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::fs::File;
use std::path::PathBuf;
use std::time::Instant;

use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "agri-pipeline")]
#[command(about = "Agricultural sensor telemetry enrichment pipeline", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: ingest, transform, validate, store
    Run {
        /// Directory containing raw parquet batch files
        #[arg(long, default_value = "data/raw")]
        raw_dir: PathBuf,
        /// Output directory for partitioned parquet
        #[arg(long, default_value = "data/processed")]
        processed_dir: PathBuf,
        /// Path for the data quality report
        #[arg(long, default_value = "data/validation_report.md")]
        report_path: PathBuf,
        /// Path of the ingestion checkpoint file
        #[arg(long, default_value = "data/.checkpoint.json")]
        checkpoint: PathBuf,
    },

    /// Generate seeded synthetic raw sensor data
    Generate {
        /// Output directory for the generated parquet files
        #[arg(long, default_value = "data/raw")]
        output_dir: PathBuf,
        /// Number of days to generate (overrides config)
        #[arg(long)]
        days: Option<u32>,
        /// Number of sensors to simulate (overrides config)
        #[arg(long)]
        sensors: Option<u32>,
        /// RNG seed (overrides config)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Profile a transformed parquet file and write a quality report
    Validate {
        /// Input parquet file to profile
        input: PathBuf,
        /// Path for the data quality report
        #[arg(long, default_value = "data/validation_report.md")]
        report_path: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.len() > 39 {
            format!("{}...", &value[..36])
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => {
            match PipelineConfig::from_yaml(path) {
                Ok(cfg) => {
                    info!("Loaded config from: {}", path.display());
                    cfg
                }
                Err(e) => {
                    warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                    PipelineConfig::default()
                }
            }
        }
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Run { raw_dir, processed_dir, report_path, checkpoint } => {
            cmd_run(&raw_dir, &processed_dir, &report_path, &checkpoint, &config);
        }
        Commands::Generate { output_dir, days, sensors, seed } => {
            cmd_generate(&output_dir, days, sensors, seed, &config);
        }
        Commands::Validate { input, report_path } => {
            cmd_validate(&input, &report_path);
        }
    }
}

fn cmd_run(
    raw_dir: &PathBuf,
    processed_dir: &PathBuf,
    report_path: &PathBuf,
    checkpoint: &PathBuf,
    config: &PipelineConfig,
) {
    use crate::core::{ingest, store};
    use crate::processors::{transform, validation};

    let start = Instant::now();

    println!("Running pipeline...");
    println!("Raw directory: {}", raw_dir.display());
    println!("Processed directory: {}", processed_dir.display());

    let spinner = create_spinner("Ingesting raw batch files...");

    let outcome = match ingest::ingest_raw_dir(raw_dir, checkpoint) {
        Ok(outcome) => outcome,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Ingestion failed: {}", e);
            std::process::exit(1);
        }
    };

    spinner.set_message("Transforming dataset...");

    let transformed = match transform::transform_data(&outcome.data, config) {
        Ok(df) => df,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Transformation failed: {}", e);
            std::process::exit(1);
        }
    };

    spinner.set_message("Validating transformed dataset...");

    let report_status = match validation::validate_data(&transformed) {
        Ok(Some(report)) => match validation::write_report(&report, report_path) {
            Ok(()) => report_path.display().to_string(),
            Err(e) => {
                spinner.finish_and_clear();
                error!("Report writing failed: {}", e);
                std::process::exit(1);
            }
        },
        Ok(None) => {
            warn!("No data to validate, skipping report");
            "not produced (no data)".to_string()
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Validation failed: {}", e);
            std::process::exit(1);
        }
    };

    spinner.set_message("Storing partitioned output...");

    let written = match store::store_partitioned(&transformed, processed_dir) {
        Ok(paths) => paths,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Storage failed: {}", e);
            std::process::exit(1);
        }
    };

    spinner.finish_and_clear();

    let anomalies = transformed
        .column("anomalous_reading")
        .ok()
        .and_then(|c| c.bool().ok().map(|ca| ca.sum().unwrap_or(0)))
        .unwrap_or(0);

    print_summary(
        "Pipeline Run Complete",
        &[
            ("Files read", outcome.files_read.to_string()),
            ("Files skipped", outcome.files_skipped.to_string()),
            ("Files failed", outcome.files_failed.to_string()),
            ("Rows ingested", outcome.data.height().to_string()),
            ("Rows transformed", transformed.height().to_string()),
            ("Anomalous readings", anomalies.to_string()),
            ("Report", report_status),
            ("Partitions written", written.len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_generate(
    output_dir: &PathBuf,
    days: Option<u32>,
    sensors: Option<u32>,
    seed: Option<u64>,
    config: &PipelineConfig,
) {
    use crate::core::generator;

    let start = Instant::now();

    // Build generator config with overrides
    let mut generator_config = config.generator.clone();
    if let Some(days) = days {
        generator_config.days = days;
    }
    if let Some(sensors) = sensors {
        generator_config.num_sensors = sensors;
    }
    if let Some(seed) = seed {
        generator_config.seed = seed;
    }

    println!("Generating sample data...");
    println!("Output directory: {}", output_dir.display());
    println!("Sensors: {}", generator_config.num_sensors);
    println!("Days: {}", generator_config.days);
    println!("Seed: {}", generator_config.seed);

    let spinner = create_spinner("Generating daily batch files...");

    match generator::generate_sample_data(output_dir, &generator_config) {
        Ok(written) => {
            spinner.finish_and_clear();

            print_summary(
                "Sample Data Generated",
                &[
                    ("Output directory", output_dir.display().to_string()),
                    ("Files written", written.len().to_string()),
                    ("Sensors", generator_config.num_sensors.to_string()),
                    ("Days", generator_config.days.to_string()),
                    ("Seed", generator_config.seed.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Generation failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_validate(input: &PathBuf, report_path: &PathBuf) {
    use crate::processors::validation;
    use polars::prelude::ParquetReader;
    use polars::prelude::SerReader;

    let start = Instant::now();

    println!("Validating dataset...");
    println!("Input: {}", input.display());

    let spinner = create_spinner("Loading parquet file...");

    let df = match File::open(input).map_err(|e| e.to_string()).and_then(|file| {
        ParquetReader::new(file).finish().map_err(|e| e.to_string())
    }) {
        Ok(df) => df,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Failed to load {}: {}", input.display(), e);
            std::process::exit(1);
        }
    };

    spinner.set_message("Profiling dataset...");

    match validation::validate_data(&df) {
        Ok(Some(report)) => {
            if let Err(e) = validation::write_report(&report, report_path) {
                spinner.finish_and_clear();
                error!("Report writing failed: {}", e);
                std::process::exit(1);
            }
            spinner.finish_and_clear();

            print_summary(
                "Validation Complete",
                &[
                    ("Input file", input.display().to_string()),
                    ("Rows profiled", df.height().to_string()),
                    ("Report", report_path.display().to_string()),
                    ("Gap series", report.gaps.height().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Ok(None) => {
            spinner.finish_and_clear();
            warn!("No data to validate, no report produced");
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Validation failed: {}", e);
            std::process::exit(1);
        }
    }
}
