// Sensor Align CLI - Command-line front end for sensor-align
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # sensor-align
//!
//! Aligns, segments and labels decoded wearable logs and writes the result
//! as JSON lines on stdout.
//!
//! ## Usage
//!
//! ```bash
//! # Carry-forward states for explicit files
//! sensor-align align --data sensor_data_1.csv sensor_data_2.csv
//!
//! # One-minute buckets for device 1, skipping sparse ones
//! sensor-align segment --dir logs/ --devices 1 --min-samples 100
//!
//! # Sensor windows before each labelled response, devices 1 to 3 on 3 workers
//! sensor-align labels --dir logs/ --devices 1,2,3 --jobs 3 --begin-offset -60 --end-offset -30
//! ```

mod commands;

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use commands::{CliError, Task};
use sensor_align::{PipelineConfig, SensorAlignError};

/// Wearable sensor log aligner
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// JSON pipeline configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Emit one carry-forward state per device-motion record
    Align {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Emit fixed-length time buckets
    Segment {
        #[command(flatten)]
        input: InputArgs,

        /// Bucket length in seconds
        #[arg(long)]
        time_window_size: Option<f64>,

        /// Downsample factor for device motion and accelerometer
        #[arg(long)]
        downsample: Option<usize>,

        /// Skip buckets with this many device-motion records or fewer (0 keeps all)
        #[arg(long)]
        min_samples: Option<usize>,
    },

    /// Emit the aligned states preceding each labelled response
    Labels {
        #[command(flatten)]
        input: InputArgs,

        /// Window start relative to the response, in seconds
        #[arg(long, allow_hyphen_values = true)]
        begin_offset: Option<f64>,

        /// Window end relative to the response, in seconds
        #[arg(long, allow_hyphen_values = true)]
        end_offset: Option<f64>,
    },
}

/// Where the logs come from
#[derive(ClapArgs, Debug, Clone)]
pub struct InputArgs {
    /// Sensor data files, in time order
    #[arg(long, num_args = 1..)]
    pub data: Vec<String>,

    /// Response files, in time order
    #[arg(long, num_args = 1..)]
    pub responses: Vec<String>,

    /// Root folder searched for `watchNNN` device folders
    #[arg(long, requires = "devices", conflicts_with_all = ["data", "responses"])]
    pub dir: Option<PathBuf>,

    /// Comma-separated device numbers used with --dir
    #[arg(
        long,
        visible_aliases = ["nums", "device"],
        value_delimiter = ',',
        num_args = 1..
    )]
    pub devices: Vec<u32>,

    /// Devices processed at once (0 = one per core)
    #[arg(long, default_value_t = 1)]
    pub jobs: usize,

    /// Out-of-order window, in records
    #[arg(long, visible_alias = "order-window-size")]
    pub window_size: Option<usize>,
}

impl Default for InputArgs {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            responses: Vec::new(),
            dir: None,
            devices: Vec::new(),
            jobs: 1,
            window_size: None,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("sensor-align v{}", sensor_align::VERSION);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Pipeline(SensorAlignError::WindowTooSmall {
            stream,
            epoch,
            last_epoch,
            window_size,
        })) => {
            error!(
                stream = %stream,
                epoch,
                last_epoch,
                window_size,
                "order window of {} records is too small for stream '{}'; rerun with a larger --window-size",
                window_size,
                stream
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let config = match &args.config {
        Some(path) => commands::load_config(path)?,
        None => PipelineConfig::default(),
    };

    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());

    let (task, input, config) = match args.command {
        Command::Align { input } => {
            let config = commands::with_input_overrides(config, &input);
            (Task::Align, input, config)
        }
        Command::Segment {
            input,
            time_window_size,
            downsample,
            min_samples,
        } => {
            let mut config = commands::with_input_overrides(config, &input);
            if let Some(size) = time_window_size {
                config.time_window_size = size;
            }
            if downsample.is_some() {
                config.downsample = downsample;
            }
            if let Some(min) = min_samples {
                config.min_samples_per_window = min;
            }
            (Task::Segment, input, config)
        }
        Command::Labels {
            input,
            begin_offset,
            end_offset,
        } => {
            let mut config = commands::with_input_overrides(config, &input);
            if let Some(offset) = begin_offset {
                config.label_window.begin_offset = offset;
            }
            if let Some(offset) = end_offset {
                config.label_window.end_offset = offset;
            }
            (Task::Labels, input, config)
        }
    };

    let targets = commands::resolve_targets(&input)?;
    let written = commands::run_targets(task, &targets, &config, input.jobs, &mut out)?;

    out.flush()?;
    info!("wrote {} lines", written);
    Ok(())
}
