// Sensor Align - Time-ordered alignment of wearable sensor logs
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Fixed-length, non-overlapping time buckets across several streams
//!
//! The segmenter starts at the earliest epoch found in any stream and then
//! walks forward in steps of `time_window_size` seconds. Every step yields a
//! [`TimeBucket`] holding, per stream, the records in `[start, end)`. Buckets
//! with no records at all (the device was off, overnight, ...) are still
//! emitted so the timeline stays gap-free. Segmentation ends once every
//! stream is exhausted.

use serde::Serialize;

use crate::config::SegmenterConfig;
use crate::error::Result;
use crate::merge::SortedMerge;
use crate::record::Record;
use crate::source::SharedSource;

/// Records of one stream inside a bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamRecords {
    pub name: String,
    pub records: Vec<Record>,
}

/// Half-open time range `[start_epoch, end_epoch)` and its records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBucket {
    pub start_epoch: f64,
    pub end_epoch: f64,
    /// One entry per configured stream, in configured order
    pub streams: Vec<StreamRecords>,
}

impl TimeBucket {
    /// Records of the named stream
    pub fn get(&self, name: &str) -> Option<&[Record]> {
        self.streams
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.records.as_slice())
    }

    /// Number of records of the named stream (0 for unknown names)
    pub fn count(&self, name: &str) -> usize {
        self.get(name).map_or(0, |r| r.len())
    }

    /// Number of records across all streams
    pub fn total_records(&self) -> usize {
        self.streams.iter().map(|s| s.records.len()).sum()
    }

    /// True if no stream contributed a record
    pub fn is_empty(&self) -> bool {
        self.streams.iter().all(|s| s.records.is_empty())
    }

    /// Bucket length in seconds
    pub fn duration(&self) -> f64 {
        self.end_epoch - self.start_epoch
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    Active,
    Done,
}

/// Splits several streams into consecutive time buckets
#[derive(Debug)]
pub struct WindowSegmenter {
    streams: Vec<SortedMerge>,
    time_window_size: f64,
    initial_start_epoch: Option<f64>,
    start_epoch: f64,
    state: SegmenterState,
    emitted: u64,
}

impl WindowSegmenter {
    /// Create a segmenter and locate the earliest record across all streams
    pub fn new(source: SharedSource, config: SegmenterConfig) -> Result<Self> {
        config.validate()?;

        let mut streams = config
            .streams
            .into_iter()
            .map(|spec| SortedMerge::new(source.clone(), spec, config.order_window_size))
            .collect::<Result<Vec<_>>>()?;

        let mut initial_start_epoch: Option<f64> = None;
        for merge in &mut streams {
            if let Some(first) = merge.peek()? {
                initial_start_epoch = Some(match initial_start_epoch {
                    Some(min) => min.min(first.epoch),
                    None => first.epoch,
                });
            }
        }

        let state = if initial_start_epoch.is_some() {
            SegmenterState::Active
        } else {
            SegmenterState::Done
        };
        log::debug!(
            "segmenter over {} streams starts at {:?}",
            streams.len(),
            initial_start_epoch
        );

        Ok(Self {
            streams,
            time_window_size: config.time_window_size,
            initial_start_epoch,
            start_epoch: initial_start_epoch.unwrap_or(0.0),
            state,
            emitted: 0,
        })
    }

    /// Earliest epoch across all streams, `None` if every stream was empty
    pub fn initial_start_epoch(&self) -> Option<f64> {
        self.initial_start_epoch
    }

    /// Start of the next bucket
    pub fn start_epoch(&self) -> f64 {
        self.start_epoch
    }

    pub fn state(&self) -> SegmenterState {
        self.state
    }

    /// Number of buckets produced so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Stream names, in bucket order
    pub fn stream_names(&self) -> Vec<&str> {
        self.streams.iter().map(|s| s.name()).collect()
    }

    /// Produce the next bucket, or `None` once every stream is exhausted
    pub fn next_bucket(&mut self) -> Result<Option<TimeBucket>> {
        if self.state == SegmenterState::Done {
            return Ok(None);
        }

        let mut finished = true;
        for merge in &mut self.streams {
            if !merge.is_exhausted()? {
                finished = false;
                break;
            }
        }
        if finished {
            log::debug!("segmenter done after {} buckets", self.emitted);
            self.state = SegmenterState::Done;
            return Ok(None);
        }

        let start_epoch = self.start_epoch;
        // Computed once per bucket so consecutive buckets share boundaries
        let end_epoch = start_epoch + self.time_window_size;

        let mut streams = Vec::with_capacity(self.streams.len());
        for merge in &mut self.streams {
            let records = collect_range(merge, start_epoch, end_epoch)?;
            streams.push(StreamRecords {
                name: merge.name().to_string(),
                records,
            });
        }

        self.start_epoch = end_epoch;
        self.emitted += 1;

        let bucket = TimeBucket {
            start_epoch,
            end_epoch,
            streams,
        };
        log::trace!(
            "bucket [{}, {}) with {} records",
            start_epoch,
            end_epoch,
            bucket.total_records()
        );
        Ok(Some(bucket))
    }
}

/// Pop every record before `end`, keeping those at or after `start`. The
/// first record at or after `end` stays in the merge for the next bucket.
fn collect_range(merge: &mut SortedMerge, start: f64, end: f64) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    loop {
        match merge.peek()? {
            Some(next) if next.epoch < end => {}
            _ => break,
        }
        if let Some(record) = merge.pop()? {
            if record.epoch >= start {
                records.push(record);
            }
        }
    }
    Ok(records)
}

impl Iterator for WindowSegmenter {
    type Item = Result<TimeBucket>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.next_bucket().transpose();
        if matches!(item, Some(Err(_))) {
            self.state = SegmenterState::Done;
        }
        item
    }
}
