// Sensor Align - Time-ordered alignment of wearable sensor logs
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Configuration types for sensor-align
//!
//! All structs are plain data with `Default` values matching the usual
//! watch study setup, and can be loaded from JSON (or any serde format).

use serde::{Deserialize, Serialize};

use crate::error::{Result, SensorAlignError};
use crate::record::RecordType;
use crate::source::FileId;

/// Default out-of-order window, in records
pub const DEFAULT_ORDER_WINDOW_SIZE: usize = 50;

/// Default bucket length, in seconds
pub const DEFAULT_TIME_WINDOW_SIZE: f64 = 60.0;

/// Default label window start, relative to the response epoch
pub const DEFAULT_BEGIN_OFFSET: f64 = -60.0;

/// Default label window end, relative to the response epoch
pub const DEFAULT_END_OFFSET: f64 = -30.0;

/// One logical stream: an ordered file list read through a type filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSpec {
    /// Name used in buckets and error messages
    pub name: String,

    /// Files in caller order; they are concatenated, not sorted
    pub files: Vec<FileId>,

    /// Only admit records of this type (`None` = everything)
    #[serde(default)]
    pub type_filter: Option<RecordType>,

    /// Keep every Nth record passing the filter (`None` = disabled)
    #[serde(default)]
    pub downsample: Option<usize>,
}

impl StreamSpec {
    /// Unfiltered stream over the given files
    pub fn new(name: impl Into<String>, files: Vec<FileId>) -> Self {
        Self {
            name: name.into(),
            files,
            type_filter: None,
            downsample: None,
        }
    }

    /// Stream of a single record type, named after the type
    pub fn of_type(record_type: RecordType, files: Vec<FileId>) -> Self {
        Self {
            name: record_type.as_str().to_string(),
            files,
            type_filter: Some(record_type),
            downsample: None,
        }
    }

    /// Set the downsample factor
    pub fn with_downsample(mut self, factor: Option<usize>) -> Self {
        self.downsample = factor;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.downsample == Some(0) {
            return Err(SensorAlignError::InvalidConfig(format!(
                "stream '{}': downsample factor must be positive",
                self.name
            )));
        }
        Ok(())
    }
}

fn validate_window_size(window_size: usize) -> Result<()> {
    if window_size == 0 {
        return Err(SensorAlignError::InvalidConfig(
            "window size must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Stream aligner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignerConfig {
    /// Out-of-order window for every underlying merge
    pub window_size: usize,

    /// Driving stream; one aligned state per record
    pub primary: StreamSpec,

    /// Streams joined onto the primary by carry-forward
    pub secondaries: Vec<StreamSpec>,
}

impl AlignerConfig {
    /// Device motion driving accelerometer and location, all read from the
    /// same sensor data files
    pub fn watch(data_files: Vec<FileId>, window_size: usize) -> Self {
        Self {
            window_size,
            primary: StreamSpec::of_type(RecordType::DeviceMotion, data_files.clone()),
            secondaries: vec![
                StreamSpec::of_type(RecordType::Accelerometer, data_files.clone()),
                StreamSpec::of_type(RecordType::Location, data_files),
            ],
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_window_size(self.window_size)?;
        self.primary.validate()?;
        for spec in &self.secondaries {
            spec.validate()?;
        }
        Ok(())
    }
}

/// Window segmenter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Out-of-order window for every underlying merge
    pub order_window_size: usize,

    /// Bucket length in seconds
    pub time_window_size: f64,

    /// Streams collected into each bucket, in output order
    pub streams: Vec<StreamSpec>,
}

impl SegmenterConfig {
    /// Responses plus device motion, accelerometer and location. Only the
    /// two high-rate streams are downsampled.
    pub fn watch(
        data_files: Vec<FileId>,
        response_files: Vec<FileId>,
        order_window_size: usize,
        time_window_size: f64,
        downsample: Option<usize>,
    ) -> Self {
        Self {
            order_window_size,
            time_window_size,
            streams: vec![
                StreamSpec::of_type(RecordType::Response, response_files),
                StreamSpec::of_type(RecordType::DeviceMotion, data_files.clone())
                    .with_downsample(downsample),
                StreamSpec::of_type(RecordType::Accelerometer, data_files.clone())
                    .with_downsample(downsample),
                StreamSpec::of_type(RecordType::Location, data_files),
            ],
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_window_size(self.order_window_size)?;
        if !(self.time_window_size.is_finite() && self.time_window_size > 0.0) {
            return Err(SensorAlignError::InvalidConfig(format!(
                "time window size must be a positive number of seconds, got {}",
                self.time_window_size
            )));
        }
        for spec in &self.streams {
            spec.validate()?;
        }
        Ok(())
    }
}

/// Label window offsets, in seconds relative to each response
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelWindowConfig {
    pub begin_offset: f64,
    pub end_offset: f64,
}

impl Default for LabelWindowConfig {
    fn default() -> Self {
        Self {
            begin_offset: DEFAULT_BEGIN_OFFSET,
            end_offset: DEFAULT_END_OFFSET,
        }
    }
}

impl LabelWindowConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.end_offset - self.begin_offset > 0.0) {
            return Err(SensorAlignError::InvalidConfig(format!(
                "end offset ({}) must be after begin offset ({})",
                self.end_offset, self.begin_offset
            )));
        }
        Ok(())
    }
}

/// Pipeline-level knobs shared by the command-line tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Out-of-order window, in records
    pub order_window_size: usize,

    /// Bucket length, in seconds
    pub time_window_size: f64,

    /// Downsample factor for high-rate streams (`None` = disabled)
    pub downsample: Option<usize>,

    /// Buckets with this many device-motion records or fewer are skipped
    pub min_samples_per_window: usize,

    /// Label window offsets
    pub label_window: LabelWindowConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            order_window_size: DEFAULT_ORDER_WINDOW_SIZE,
            time_window_size: DEFAULT_TIME_WINDOW_SIZE,
            downsample: None,
            min_samples_per_window: 0,
            label_window: LabelWindowConfig::default(),
        }
    }
}
