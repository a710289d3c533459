// Sensor Align - Time-ordered alignment of wearable sensor logs
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Aligned sensor windows around labelled responses
//!
//! For every response the extractor gathers the aligned states whose epoch
//! lies in `[response + begin_offset, response + end_offset]`. States before
//! the window are consumed and dropped; the first state after it is left in
//! the aligner for the next response. Responses without any state in their
//! window are skipped.

use serde::Serialize;

use crate::aligner::{AlignedState, StreamAligner};
use crate::config::LabelWindowConfig;
use crate::error::Result;
use crate::merge::SortedMerge;
use crate::record::Record;

/// A response and the sensor states leading up to it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledWindow {
    pub response: Record,
    pub states: Vec<AlignedState>,
}

impl LabeledWindow {
    /// Activity label of the response
    pub fn label(&self) -> Option<&str> {
        self.response.label()
    }
}

/// Walks responses in time order and cuts matching state windows
#[derive(Debug)]
pub struct LabelWindows {
    responses: SortedMerge,
    aligner: StreamAligner,
    config: LabelWindowConfig,
    skipped: u64,
    failed: bool,
}

impl LabelWindows {
    pub fn new(
        responses: SortedMerge,
        aligner: StreamAligner,
        config: LabelWindowConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            responses,
            aligner,
            config,
            skipped: 0,
            failed: false,
        })
    }

    /// Responses skipped so far because no state fell in their window
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Next response with a non-empty window, `None` once responses run out
    pub fn next_window(&mut self) -> Result<Option<LabeledWindow>> {
        while let Some(response) = self.responses.pop()? {
            let begin = response.epoch + self.config.begin_offset;
            let end = response.epoch + self.config.end_offset;

            let states = self.collect_states(begin, end)?;
            if states.is_empty() {
                log::debug!(
                    "no data for label {:?} at {}",
                    response.label(),
                    response.epoch
                );
                self.skipped += 1;
                continue;
            }

            log::debug!(
                "label {:?} at {}: {} states",
                response.label(),
                response.epoch,
                states.len()
            );
            return Ok(Some(LabeledWindow { response, states }));
        }
        Ok(None)
    }

    fn collect_states(&mut self, begin: f64, end: f64) -> Result<Vec<AlignedState>> {
        let mut states = Vec::new();
        loop {
            let epoch = match self.aligner.peek()? {
                Some(state) => state.epoch,
                None => break,
            };
            if epoch > end {
                // Belongs to a later response
                break;
            }
            if let Some(state) = self.aligner.pop()? {
                if epoch >= begin {
                    states.push(state);
                }
            }
        }
        Ok(states)
    }
}

impl Iterator for LabelWindows {
    type Item = Result<LabeledWindow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.next_window().transpose();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }
}
