//! Append-only trial log shared by every adaptive procedure.

use serde::{Deserialize, Serialize};

/// A single presented stimulus and the observed binary response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Zero-based position of the trial within the session.
    pub trial_index: usize,
    /// Stimulus value that was presented.
    pub stimulus: f64,
    /// Whether the response was "positive" (detected / correct).
    pub response: bool,
}

/// Chronological, append-only log of trials.
///
/// Records can only be pushed; `trial_index` always equals the position of the
/// record in the log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrialHistory {
    records: Vec<TrialRecord>,
}

impl TrialHistory {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a trial and returns the stored record.
    pub fn append(&mut self, stimulus: f64, response: bool) -> TrialRecord {
        let record = TrialRecord {
            trial_index: self.records.len(),
            stimulus,
            response,
        };
        self.records.push(record);
        record
    }

    /// Number of trials recorded so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true when no trial has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Immutable view over all records in chronological order.
    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    /// The most recent `n` records (fewer when the history is shorter).
    pub fn last_n(&self, n: usize) -> &[TrialRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    /// Fraction of positive responses, `None` for an empty history.
    pub fn response_rate(&self) -> Option<f64> {
        rate(&self.records)
    }

    /// Smallest and largest stimulus presented so far.
    pub fn stimulus_range(&self) -> Option<(f64, f64)> {
        let mut iter = self.records.iter().map(|record| record.stimulus);
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), value| {
            (lo.min(value), hi.max(value))
        }))
    }

    /// Drops every record; used when a new session starts.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Fraction of positive responses within a slice of records.
pub fn rate(records: &[TrialRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    let positives = records.iter().filter(|record| record.response).count();
    Some(positives as f64 / records.len() as f64)
}
