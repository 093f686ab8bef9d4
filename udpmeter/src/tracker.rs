//! Sequence tracking: duplicate, out-of-order and loss accounting over an
//! unordered stream of sequence numbers.
//!
//! Every distinct sequence number is retained for the life of the tracker, so
//! memory grows with the number of packets received. A sliding bitmap keyed
//! to `min_seq` would bound this, at the cost of no longer recognizing very
//! late duplicates.
use std::collections::HashSet;

/// What a single [`SequenceTracker::observe`] call recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Observation {
    pub duplicate: bool,
    pub out_of_order: bool,
}

/// Point-in-time view of the tracker's loss accounting.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LossSnapshot {
    pub expected: u64,
    pub received: u64,
    pub missing: u64,
    pub loss_percent: f64,
    pub duplicates: u64,
    pub out_of_order: u64,
    pub min_seq: Option<u64>,
    pub max_seq: Option<u64>,
}

/// Incremental loss/duplicate/reorder tracker for one receive session.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    seen: HashSet<u64>,
    min_seq: Option<u64>,
    max_seq: Option<u64>,
    last_seq: Option<u64>,
    duplicates: u64,
    out_of_order: u64,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one decoded sequence number, in arrival order.
    ///
    /// Reordering is judged against the immediately preceding arrival only,
    /// duplicates included, so this counts descents in arrival order rather
    /// than true inversions.
    pub fn observe(&mut self, sequence: u64) -> Observation {
        let duplicate = !self.seen.insert(sequence);
        if duplicate {
            self.duplicates += 1;
        } else {
            self.min_seq = Some(self.min_seq.map_or(sequence, |min| min.min(sequence)));
            self.max_seq = Some(self.max_seq.map_or(sequence, |max| max.max(sequence)));
        }

        let out_of_order = matches!(self.last_seq, Some(last) if sequence < last);
        if out_of_order {
            self.out_of_order += 1;
        }
        self.last_seq = Some(sequence);

        Observation {
            duplicate,
            out_of_order,
        }
    }

    /// Number of packets spanned by the observed sequence range.
    pub fn expected(&self) -> u64 {
        match (self.min_seq, self.max_seq) {
            (Some(min), Some(max)) => (max - min).saturating_add(1),
            _ => 0,
        }
    }

    /// Number of distinct sequence numbers observed.
    pub fn received(&self) -> u64 {
        self.seen.len() as u64
    }

    pub fn missing(&self) -> u64 {
        self.expected().saturating_sub(self.received())
    }

    /// Cumulative loss over the observed range, 0 when nothing was observed.
    pub fn loss_percent(&self) -> f64 {
        let expected = self.expected();
        if expected == 0 {
            return 0.0;
        }
        self.missing() as f64 / expected as f64 * 100.0
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    pub fn out_of_order(&self) -> u64 {
        self.out_of_order
    }

    pub fn min_seq(&self) -> Option<u64> {
        self.min_seq
    }

    pub fn max_seq(&self) -> Option<u64> {
        self.max_seq
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    pub fn snapshot(&self) -> LossSnapshot {
        LossSnapshot {
            expected: self.expected(),
            received: self.received(),
            missing: self.missing(),
            loss_percent: self.loss_percent(),
            duplicates: self.duplicates,
            out_of_order: self.out_of_order,
            min_seq: self.min_seq,
            max_seq: self.max_seq,
        }
    }
}
