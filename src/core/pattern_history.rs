//! Bounded history of the input patterns the classifier has seen.
//!
//! Learning for a step `n` needs the pattern that was active `n` records ago, so the classifier
//! keeps the last `max(steps) + 1` patterns together with their record numbers. The buffer has
//! a fixed capacity: once it is full, recording a new pattern evicts the oldest one.
//!
//! Record numbers may contain gaps (missing records). Lookups therefore match on the exact
//! record number instead of on the position in the buffer, and simply report `None` when the
//! requested record was never seen or was already evicted.

use super::error::ClassifierError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A pattern together with the record number it was observed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub record_num: u32,
    pub pattern: Vec<usize>,
}

/// A fixed-capacity, time-ordered ring buffer of `HistoryEntry` values (oldest first).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternHistory {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl PatternHistory {
    /// Creates an empty history that holds at most `capacity` patterns.
    ///
    /// Storage grows with the entries actually recorded, so a long horizon costs nothing up front.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::new(),
        }
    }

    /// Appends `pattern` as observed at `record_num`, evicting the oldest entry when full.
    ///
    /// Returns `Ok(false)` without touching the buffer if `record_num` is already the newest
    /// entry, so a record is stored only once even if it is computed several times.
    /// Fails if `record_num` is lower than the newest recorded number.
    pub fn record(&mut self, record_num: u32, pattern: &[usize]) -> anyhow::Result<bool> {
        if let Some(previous) = self.last_record_num() {
            anyhow::ensure!(
                record_num >= previous,
                ClassifierError::RecordOutOfOrder {
                    previous,
                    current: record_num,
                }
            );

            if record_num == previous {
                return Ok(false);
            }
        }

        if self.capacity == 0 {
            return Ok(false);
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }

        self.entries.push_back(HistoryEntry {
            record_num,
            pattern: pattern.to_vec(),
        });

        Ok(true)
    }

    /// Returns the pattern observed exactly `step` records before `record_num`, if still held.
    #[inline]
    pub fn lookup(&self, step: u32, record_num: u32) -> Option<&[usize]> {
        let target = record_num.checked_sub(step)?;

        self.entries
            .iter()
            .rev()
            .find(|entry| entry.record_num == target)
            .map(|entry| entry.pattern.as_slice())
    }

    /// The record number of the newest entry.
    pub fn last_record_num(&self) -> Option<u32> {
        self.entries.back().map(|entry| entry.record_num)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates over the stored entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Checks the ordering and size invariants, used after deserialization.
    pub(crate) fn is_consistent(&self) -> bool {
        self.entries.len() <= self.capacity
            && self
                .entries
                .iter()
                .zip(self.entries.iter().skip(1))
                .all(|(older, newer)| older.record_num < newer.record_num)
    }
}
