//! Numeric row buffering for the tensor sink.
//!
//! Rows accumulate across files until their packed byte size reaches the
//! flush threshold; the buffer is handed over whole and reset. The residual
//! buffer at the end of a grouping unit is flushed regardless of size.

use crate::constants::{BATCH_SIZE_LIMIT_BYTES, RECORD_FIELD_COUNT};

/// One packed numeric record row
pub type NumericRow = [f64; RECORD_FIELD_COUNT];

const ROW_BYTES: u64 = (RECORD_FIELD_COUNT * std::mem::size_of::<f64>()) as u64;

/// Byte-bounded buffer of numeric rows
#[derive(Debug)]
pub struct BatchAccumulator {
    rows: Vec<NumericRow>,
    bytes: u64,
    limit: u64,
}

impl BatchAccumulator {
    /// Accumulator with the standard 2 GiB flush threshold
    pub fn new() -> Self {
        Self::with_limit(BATCH_SIZE_LIMIT_BYTES)
    }

    /// Accumulator with a custom flush threshold
    pub fn with_limit(limit: u64) -> Self {
        Self {
            rows: Vec::new(),
            bytes: 0,
            limit,
        }
    }

    pub fn push(&mut self, row: NumericRow) {
        self.rows.push(row);
        self.bytes += ROW_BYTES;
    }

    /// Whether the buffer has reached the flush threshold
    pub fn is_full(&self) -> bool {
        self.bytes >= self.limit
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn byte_size(&self) -> u64 {
        self.bytes
    }

    /// Hand over the buffered rows and reset the accumulator
    pub fn take(&mut self) -> Vec<NumericRow> {
        self.bytes = 0;
        std::mem::take(&mut self.rows)
    }
}

impl Default for BatchAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
