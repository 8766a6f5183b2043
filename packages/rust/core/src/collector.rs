//! Run-scoped accumulation of collected records.

use notescout_shared::Record;

/// Ordered records of one run, capped at a target count.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    target: usize,
    records: Vec<Record>,
}

impl ResultSet {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            records: Vec::with_capacity(target.min(1_000)),
        }
    }

    /// Append a record. Returns `false` (and drops it) once the set is full.
    pub fn push(&mut self, record: Record) -> bool {
        if self.is_full() {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.target
    }

    /// How many more records fit.
    pub fn remaining(&self) -> usize {
        self.target.saturating_sub(self.records.len())
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in arrival order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}
