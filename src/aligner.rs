// Sensor Align - Time-ordered alignment of wearable sensor logs
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Carry-forward alignment of secondary streams onto a primary stream
//!
//! Every primary record produces one [`AlignedState`]. Each secondary stream
//! is advanced up to, but never past, the primary epoch, and the last record
//! consumed from it is held until a newer one arrives (sample-and-hold). A
//! secondary that has produced nothing yet is reported as `None`.
//!
//! The aligner is itself peekable: [`StreamAligner::peek`] builds the next
//! state and keeps it until [`StreamAligner::pop`] hands it out, so a caller
//! can stop at a state that belongs to a later window.

use serde::Serialize;

use crate::config::AlignerConfig;
use crate::error::Result;
use crate::merge::SortedMerge;
use crate::record::Record;
use crate::source::SharedSource;

/// Primary record plus the latest secondary records at or before it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedState {
    /// Primary epoch
    pub epoch: f64,
    pub primary: Record,
    /// One entry per secondary stream, in configured order
    pub secondaries: Vec<Option<Record>>,
}

impl AlignedState {
    /// Last known value of the secondary at `index`
    pub fn secondary(&self, index: usize) -> Option<&Record> {
        self.secondaries.get(index).and_then(|r| r.as_ref())
    }
}

/// A secondary stream and the value it carries forward
#[derive(Debug)]
struct Secondary {
    merge: SortedMerge,
    last: Option<Record>,
}

/// Joins secondary streams onto a primary stream's timeline
#[derive(Debug)]
pub struct StreamAligner {
    primary: SortedMerge,
    secondaries: Vec<Secondary>,
    /// State built by `peek` and not yet popped
    pending: Option<AlignedState>,
    failed: bool,
}

impl StreamAligner {
    /// Create an aligner; every stream gets its own merge over `source`
    pub fn new(source: SharedSource, config: AlignerConfig) -> Result<Self> {
        config.validate()?;

        let primary = SortedMerge::new(source.clone(), config.primary, config.window_size)?;
        let secondaries = config
            .secondaries
            .into_iter()
            .map(|spec| {
                Ok(Secondary {
                    merge: SortedMerge::new(source.clone(), spec, config.window_size)?,
                    last: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            primary,
            secondaries,
            pending: None,
            failed: false,
        })
    }

    /// Name of the primary stream
    pub fn primary_name(&self) -> &str {
        self.primary.name()
    }

    /// Secondary stream names, in the order used by [`AlignedState::secondaries`]
    pub fn secondary_names(&self) -> Vec<&str> {
        self.secondaries.iter().map(|s| s.merge.name()).collect()
    }

    /// Position of a secondary stream by name
    pub fn secondary_index(&self, name: &str) -> Option<usize> {
        self.secondaries.iter().position(|s| s.merge.name() == name)
    }

    /// Look at the next state without consuming it
    pub fn peek(&mut self) -> Result<Option<&AlignedState>> {
        if self.pending.is_none() {
            self.pending = self.next_state()?;
        }
        Ok(self.pending.as_ref())
    }

    /// Consume and return the next state
    pub fn pop(&mut self) -> Result<Option<AlignedState>> {
        match self.pending.take() {
            Some(state) => Ok(Some(state)),
            None => self.next_state(),
        }
    }

    fn next_state(&mut self) -> Result<Option<AlignedState>> {
        let primary = match self.primary.pop()? {
            Some(record) => record,
            None => return Ok(None),
        };
        let epoch = primary.epoch;

        for secondary in &mut self.secondaries {
            // Keep the previous value when nothing new precedes this tick
            if let Some(latest) = advance_before(&mut secondary.merge, epoch)? {
                secondary.last = Some(latest);
            }
        }

        Ok(Some(AlignedState {
            epoch,
            primary,
            secondaries: self.secondaries.iter().map(|s| s.last.clone()).collect(),
        }))
    }
}

/// Pop every record strictly older than `epoch` and return the newest of
/// them. The first record at or after `epoch` stays in the merge.
fn advance_before(merge: &mut SortedMerge, epoch: f64) -> Result<Option<Record>> {
    let mut latest = None;
    loop {
        match merge.peek()? {
            Some(next) if next.epoch < epoch => {}
            _ => break,
        }
        latest = merge.pop()?;
    }
    Ok(latest)
}

impl Iterator for StreamAligner {
    type Item = Result<AlignedState>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.pop().transpose();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }
}
