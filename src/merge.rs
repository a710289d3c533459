// Sensor Align - Time-ordered alignment of wearable sensor logs
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Bounded-lookahead, time-ordered merge over one logical stream
//!
//! [`SortedMerge`] reads the files of a [`StreamSpec`] one after another and
//! keeps at most `window_size` admitted records in a min-heap keyed by
//! epoch. Records therefore come out sorted as long as no record is more
//! than `window_size` positions out of place. When that assumption breaks,
//! the merge fails with [`SensorAlignError::WindowTooSmall`] instead of
//! emitting an older record.
//!
//! The same type serves both consumption styles:
//!
//! - as an [`Iterator`], each `next()` consumes the minimum;
//! - through [`peek`](SortedMerge::peek) and [`pop`](SortedMerge::pop), a
//!   consumer can look at the next record and leave it in place.
//!
//! ```rust
//! use sensor_align::{MemorySource, Record, SortedMerge, StreamSpec};
//!
//! let source = MemorySource::new()
//!     .with_file("a", vec![Record::response(2.0, "Eat"), Record::response(1.0, "Cook")])
//!     .into_shared();
//! let spec = StreamSpec::new("responses", vec!["a".to_string()]);
//!
//! let mut merge = SortedMerge::new(source, spec, 2).unwrap();
//! assert_eq!(merge.peek().unwrap().map(|r| r.epoch), Some(1.0));
//! let epochs: Vec<f64> = merge.map(|r| r.unwrap().epoch).collect();
//! assert_eq!(epochs, vec![1.0, 2.0]);
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::config::StreamSpec;
use crate::error::{Result, SensorAlignError};
use crate::record::Record;
use crate::source::SharedSource;

/// Heap entry ordered by epoch only, reversed so `BinaryHeap` pops the
/// smallest epoch first.
#[derive(Debug)]
struct HeapEntry {
    epoch: f64,
    record: Record,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Equal epochs compare equal: their relative order is unspecified
        other.epoch.total_cmp(&self.epoch)
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Time-ordered merge over the files of one stream
pub struct SortedMerge {
    source: SharedSource,
    spec: StreamSpec,
    window_size: usize,

    heap: BinaryHeap<HeapEntry>,
    /// Remaining records of the file currently feeding the heap
    records: std::vec::IntoIter<Record>,
    /// Next file to load (index into `spec.files`)
    file_index: usize,
    /// Records read so far from the current file
    record_index: usize,

    /// Largest epoch emitted so far
    last_epoch: Option<f64>,
    /// Records that passed the type filter, across all files
    sample_counter: u64,
    /// Set once an ordering violation has been detected
    violation: Option<SensorAlignError>,
    /// Whether the iterator already yielded the violation
    violation_reported: bool,
    /// Refill failure after a successful pop, reported by the next call
    deferred: Option<SensorAlignError>,

    emitted: u64,
}

impl SortedMerge {
    /// Create a merge over `spec` with a window of `window_size` records
    pub fn new(source: SharedSource, spec: StreamSpec, window_size: usize) -> Result<Self> {
        if window_size == 0 {
            return Err(SensorAlignError::InvalidConfig(format!(
                "stream '{}': window size must be positive",
                spec.name
            )));
        }
        spec.validate()?;

        Ok(Self {
            source,
            spec,
            window_size,
            heap: BinaryHeap::with_capacity(window_size),
            records: Vec::new().into_iter(),
            file_index: 0,
            record_index: 0,
            last_epoch: None,
            sample_counter: 0,
            violation: None,
            violation_reported: false,
            deferred: None,
            emitted: 0,
        })
    }

    /// Stream name
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Configured window size
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Number of records currently buffered
    pub fn buffered(&self) -> usize {
        self.heap.len()
    }

    /// Number of records emitted so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Largest epoch emitted so far
    pub fn last_epoch(&self) -> Option<f64> {
        self.last_epoch
    }

    /// Look at the next record without consuming it
    ///
    /// Returns `Ok(None)` at the end of the stream. Repeated calls return
    /// the same record until [`pop`](Self::pop) is called.
    pub fn peek(&mut self) -> Result<Option<&Record>> {
        self.check_violation()?;
        self.fill()?;
        Ok(self.heap.peek().map(|entry| &entry.record))
    }

    /// True once every file is read and the buffer is drained
    pub fn is_exhausted(&mut self) -> Result<bool> {
        Ok(self.peek()?.is_none())
    }

    /// Remove and return the next record, then refill the window so the
    /// following [`peek`](Self::peek) is ready
    ///
    /// Returns `Ok(None)` at the end of the stream, and
    /// [`SensorAlignError::WindowTooSmall`] if the next record is older than
    /// one already emitted. After a violation every call fails the same way.
    /// A source failure during the refill is returned by the next call.
    pub fn pop(&mut self) -> Result<Option<Record>> {
        self.check_violation()?;
        self.fill()?;

        let entry = match self.heap.pop() {
            Some(entry) => entry,
            None => return Ok(None),
        };

        if let Some(last_epoch) = self.last_epoch {
            if entry.epoch < last_epoch {
                let err = SensorAlignError::WindowTooSmall {
                    stream: self.spec.name.clone(),
                    epoch: entry.epoch,
                    last_epoch,
                    window_size: self.window_size,
                };
                log::warn!("{}", err);
                self.violation = Some(err.clone());
                return Err(err);
            }
        }

        self.last_epoch = Some(match self.last_epoch {
            Some(last) => last.max(entry.epoch),
            None => entry.epoch,
        });
        self.emitted += 1;

        if let Err(err) = self.fill() {
            self.deferred = Some(err);
        }
        Ok(Some(entry.record))
    }

    fn check_violation(&mut self) -> Result<()> {
        if let Some(err) = &self.violation {
            return Err(err.clone());
        }
        match self.deferred.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Read records until the heap holds `window_size` of them or every file
    /// is exhausted
    fn fill(&mut self) -> Result<()> {
        while self.heap.len() < self.window_size {
            let record = match self.records.next() {
                Some(record) => record,
                // The next file may be empty, so go around again
                None if self.load_next_file()? => continue,
                None => return Ok(()),
            };
            self.record_index += 1;

            if !record.epoch.is_finite() {
                return Err(SensorAlignError::MalformedRecord {
                    file: self.current_file().to_string(),
                    line: self.record_index as u64,
                    reason: format!("non-finite epoch {}", record.epoch),
                });
            }
            if self.admit(&record) {
                self.heap.push(HeapEntry {
                    epoch: record.epoch,
                    record,
                });
            }
        }
        Ok(())
    }

    /// Apply the type filter, then the downsample gate
    fn admit(&mut self, record: &Record) -> bool {
        if let Some(wanted) = self.spec.type_filter {
            if record.record_type() != wanted {
                return false;
            }
        }

        self.sample_counter += 1;
        match self.spec.downsample {
            Some(factor) => self.sample_counter % factor as u64 == 0,
            None => true,
        }
    }

    fn current_file(&self) -> &str {
        self.file_index
            .checked_sub(1)
            .and_then(|i| self.spec.files.get(i))
            .map_or("", |f| f.as_str())
    }

    fn load_next_file(&mut self) -> Result<bool> {
        let Some(file) = self.spec.files.get(self.file_index) else {
            return Ok(false);
        };

        let records = self.source.load(file)?;
        log::debug!(
            "stream '{}': loaded {} records from {}",
            self.spec.name,
            records.len(),
            file
        );

        self.records = records.into_iter();
        self.record_index = 0;
        self.file_index += 1;
        Ok(true)
    }
}

impl Iterator for SortedMerge {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.violation_reported {
            return None;
        }

        let item = self.pop().transpose();
        if self.violation.is_some() {
            self.violation_reported = true;
        }
        item
    }
}

impl std::fmt::Debug for SortedMerge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortedMerge")
            .field("stream", &self.spec.name)
            .field("window_size", &self.window_size)
            .field("buffered", &self.heap.len())
            .field("file_index", &self.file_index)
            .field("record_index", &self.record_index)
            .field("last_epoch", &self.last_epoch)
            .finish()
    }
}
