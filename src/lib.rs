//! # sensor-align - Time-ordered alignment of wearable sensor logs
//!
//! Wearable devices write several sensor streams (device motion,
//! accelerometer, location, battery) and labelled activity responses into
//! many log files. Records inside a file are only roughly in time order and
//! the streams are sampled at different rates. This crate turns them into
//! time-synchronised views with bounded memory.
//!
//! ## Key Features
//!
//! - **Bounded merge**: [`SortedMerge`] sorts each stream with a fixed-size
//!   window and fails loudly when the window is too small
//! - **Peek without consuming**: every stage can look ahead and leave a
//!   record in place for the next window
//! - **Carry-forward join**: [`StreamAligner`] attaches the latest
//!   secondary readings to every primary record
//! - **Time buckets**: [`WindowSegmenter`] tiles the timeline into fixed,
//!   non-overlapping buckets, empty ones included
//! - **Label windows**: [`LabelWindows`] cuts the sensor states preceding
//!   each labelled response
//!
//! ## Quick Start
//!
//! ```rust
//! use sensor_align::{AlignerConfig, DeviceMotion, MemorySource, Record, StreamAligner, Vector3};
//!
//! let source = MemorySource::new()
//!     .with_file(
//!         "sensor_data_1",
//!         vec![
//!             Record::device_motion(100.0, DeviceMotion::default()),
//!             Record::accelerometer(101.0, Vector3::new(0.0, 0.0, 1.0)),
//!             Record::device_motion(102.0, DeviceMotion::default()),
//!         ],
//!     )
//!     .into_shared();
//!
//! let config = AlignerConfig::watch(vec!["sensor_data_1".to_string()], 50);
//! let aligner = StreamAligner::new(source, config).unwrap();
//!
//! let states: Vec<_> = aligner.collect::<Result<_, _>>().unwrap();
//! assert_eq!(states.len(), 2);
//! assert!(states[0].secondary(0).is_none());
//! assert_eq!(states[1].secondary(0).map(|r| r.epoch), Some(101.0));
//! ```
//!
//! ## Modules
//!
//! - [`record`]: Decoded record types
//! - [`source`]: Record sources and the decode cache
//! - [`csv_source`]: CSV-backed record source
//! - [`files`]: Log file discovery
//! - [`merge`]: Bounded, peekable time-ordered merge
//! - [`aligner`]: Carry-forward stream alignment
//! - [`segmenter`]: Fixed time buckets
//! - [`labels`]: Windows around labelled responses
//! - [`config`]: Configuration types

// Modules
pub mod aligner;
pub mod config;
pub mod csv_source;
pub mod error;
pub mod files;
pub mod labels;
pub mod merge;
pub mod record;
pub mod segmenter;
pub mod source;

// Re-exports for convenient access
pub use aligner::{AlignedState, StreamAligner};
pub use config::{AlignerConfig, LabelWindowConfig, PipelineConfig, SegmenterConfig, StreamSpec};
pub use csv_source::CsvSource;
pub use error::{Result, SensorAlignError};
pub use files::{discover, FileKind};
pub use labels::{LabelWindows, LabeledWindow};
pub use merge::SortedMerge;
pub use record::{
    Attitude, Battery, BatteryState, DeviceMotion, Location, Payload, Record, RecordType,
    Response, Vector3,
};
pub use segmenter::{SegmenterState, StreamRecords, TimeBucket, WindowSegmenter};
pub use source::{CachedSource, FileId, MemorySource, RecordSource, SharedSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
