// Sensor Align CLI - Command-line front end for sensor-align
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Subcommand implementations.
//!
//! Each command writes one JSON document per line to the given writer and
//! returns the number of lines written. With `--dir` every requested device
//! is a separate [`Target`]; lines then carry a `device` field, and devices
//! may be processed on a worker pool.

use rayon::prelude::*;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sensor_align::{
    discover, AlignerConfig, CachedSource, CsvSource, FileId, FileKind, LabelWindows,
    PipelineConfig, RecordType, SegmenterConfig, SensorAlignError, SharedSource, SortedMerge,
    StreamAligner, StreamSpec, WindowSegmenter,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::InputArgs;

/// CLI errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Pipeline failure
    #[error(transparent)]
    Pipeline(#[from] SensorAlignError),

    /// Configuration file could not be read or parsed
    #[error("config {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    /// Nothing to process
    #[error("no input: {0}")]
    MissingInput(String),

    /// Worker pool could not be started
    #[error("worker pool: {0}")]
    Pool(String),

    /// Writing output failed
    #[error("output: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding output failed
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Files to process, in time order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inputs {
    pub data: Vec<FileId>,
    pub responses: Vec<FileId>,
}

/// One unit of work: a device's files, or explicitly listed files
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Target {
    /// Device number when the files were discovered under `--dir`
    pub device: Option<u32>,
    pub inputs: Inputs,
}

/// Subcommand to run on every target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Align,
    Segment,
    Labels,
}

/// Output line, tagged with the device it came from
#[derive(Serialize)]
struct Line<'a, T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<u32>,
    #[serde(flatten)]
    item: &'a T,
}

/// Read a JSON [`PipelineConfig`]; missing keys keep their defaults
pub fn load_config(path: &Path) -> Result<PipelineConfig, CliError> {
    let text = std::fs::read_to_string(path).map_err(|e| CliError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| CliError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Apply flags shared by every subcommand
pub fn with_input_overrides(mut config: PipelineConfig, input: &InputArgs) -> PipelineConfig {
    if let Some(size) = input.window_size {
        config.order_window_size = size;
    }
    config
}

/// One target per device below `--dir`, or a single target for explicit
/// file lists
pub fn resolve_targets(input: &InputArgs) -> Result<Vec<Target>, CliError> {
    let Some(dir) = &input.dir else {
        return Ok(vec![Target {
            device: None,
            inputs: Inputs {
                data: input.data.clone(),
                responses: input.responses.clone(),
            },
        }]);
    };
    if input.devices.is_empty() {
        return Err(CliError::MissingInput("--dir needs --devices".to_string()));
    }

    let mut targets = Vec::with_capacity(input.devices.len());
    for &device in &input.devices {
        let inputs = Inputs {
            data: discover(dir, device, FileKind::SensorData)?,
            responses: discover(dir, device, FileKind::Responses)?,
        };
        debug!(
            device,
            "{} data files, {} response files",
            inputs.data.len(),
            inputs.responses.len()
        );
        targets.push(Target {
            device: Some(device),
            inputs,
        });
    }
    Ok(targets)
}

/// Run `task` over every target and write the lines in target order
///
/// `jobs` is the worker count: 1 runs targets one after another, 0 uses
/// one worker per core.
pub fn run_targets<W: Write>(
    task: Task,
    targets: &[Target],
    config: &PipelineConfig,
    jobs: usize,
    out: &mut W,
) -> Result<u64, CliError> {
    if jobs == 1 || targets.len() <= 1 {
        let mut written = 0;
        for target in targets {
            written += run_task(task, target, config, out)?;
        }
        return Ok(written);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| CliError::Pool(e.to_string()))?;
    info!(
        "processing {} devices on {} workers",
        targets.len(),
        pool.current_num_threads()
    );

    let results: Vec<Result<(Vec<u8>, u64), CliError>> = pool.install(|| {
        targets
            .par_iter()
            .map(|target| {
                let mut buffer = Vec::new();
                let written = run_task(task, target, config, &mut buffer)?;
                Ok((buffer, written))
            })
            .collect()
    });

    let mut written = 0;
    for result in results {
        let (buffer, lines) = result?;
        out.write_all(&buffer)?;
        written += lines;
    }
    Ok(written)
}

/// Run `task` on a single target
pub fn run_task<W: Write>(
    task: Task,
    target: &Target,
    config: &PipelineConfig,
    out: &mut W,
) -> Result<u64, CliError> {
    let written = match task {
        Task::Align => align(target, config, out),
        Task::Segment => segment(target, config, out),
        Task::Labels => labels(target, config, out),
    }?;
    match target.device {
        Some(device) => info!(device, "{:?}: wrote {} lines", task, written),
        None => debug!("{:?}: wrote {} lines", task, written),
    }
    Ok(written)
}

fn csv_source() -> SharedSource {
    Arc::new(CachedSource::new(CsvSource::new()))
}

fn write_line<W: Write, T: Serialize>(
    out: &mut W,
    device: Option<u32>,
    item: &T,
) -> Result<(), CliError> {
    serde_json::to_writer(&mut *out, &Line { device, item })?;
    out.write_all(b"\n")?;
    Ok(())
}

/// One aligned state per device-motion record
pub fn align<W: Write>(
    target: &Target,
    config: &PipelineConfig,
    out: &mut W,
) -> Result<u64, CliError> {
    let inputs = &target.inputs;
    if inputs.data.is_empty() {
        return Err(CliError::MissingInput("no sensor data files".to_string()));
    }

    let aligner = StreamAligner::new(
        csv_source(),
        AlignerConfig::watch(inputs.data.clone(), config.order_window_size),
    )?;
    debug!(
        "aligning {} onto {}",
        aligner.secondary_names().join(", "),
        aligner.primary_name()
    );

    let mut written = 0;
    for state in aligner {
        write_line(out, target.device, &state?)?;
        written += 1;
    }
    Ok(written)
}

/// Time buckets; with a non-zero `min_samples_per_window`, only those with
/// more device-motion records than that
pub fn segment<W: Write>(
    target: &Target,
    config: &PipelineConfig,
    out: &mut W,
) -> Result<u64, CliError> {
    let inputs = &target.inputs;
    if inputs.data.is_empty() && inputs.responses.is_empty() {
        return Err(CliError::MissingInput("no log files".to_string()));
    }

    let segmenter = WindowSegmenter::new(
        csv_source(),
        SegmenterConfig::watch(
            inputs.data.clone(),
            inputs.responses.clone(),
            config.order_window_size,
            config.time_window_size,
            config.downsample,
        ),
    )?;

    let mut written = 0;
    let mut sparse = 0;
    for bucket in segmenter {
        let bucket = bucket?;
        let min = config.min_samples_per_window;
        if min > 0 && bucket.count(RecordType::DeviceMotion.as_str()) <= min {
            sparse += 1;
            continue;
        }
        write_line(out, target.device, &bucket)?;
        written += 1;
    }
    if sparse > 0 {
        info!("skipped {} buckets with too few samples", sparse);
    }
    Ok(written)
}

/// Aligned states preceding each response
pub fn labels<W: Write>(
    target: &Target,
    config: &PipelineConfig,
    out: &mut W,
) -> Result<u64, CliError> {
    let inputs = &target.inputs;
    if inputs.responses.is_empty() {
        return Err(CliError::MissingInput("no response files".to_string()));
    }

    let source = csv_source();
    let aligner = StreamAligner::new(
        source.clone(),
        AlignerConfig::watch(inputs.data.clone(), config.order_window_size),
    )?;
    let responses = SortedMerge::new(
        source,
        StreamSpec::of_type(RecordType::Response, inputs.responses.clone()),
        config.order_window_size,
    )?;
    let mut windows = LabelWindows::new(responses, aligner, config.label_window)?;

    let mut written = 0;
    for window in windows.by_ref() {
        write_line(out, target.device, &window?)?;
        written += 1;
    }
    if windows.skipped() > 0 {
        warn!(
            "{} responses had no sensor data in their window",
            windows.skipped()
        );
    }
    Ok(written)
}
