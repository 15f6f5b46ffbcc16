//! Aggregation reducer
//!
//! Folds parsed rows into per-category running totals with O(1) work per
//! row. A count field that does not parse as a base-10 integer drops that
//! one record silently; it contributes to no total and is excluded from
//! `records_accepted`. Structural problems never reach this layer, the
//! parser already treats them as fatal.

use std::collections::HashMap;

use crate::error::EngineError;
use crate::parser::RawRecord;

/// Default number of accepted records between progress checkpoints.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Running aggregation state for one job.
///
/// Owned exclusively by the job's background worker; never shared and never
/// observable by other components. Totals are 64-bit with checked addition:
/// an overflowing category fails the job deterministically.
#[derive(Debug, Default)]
pub struct Aggregator {
    totals: HashMap<String, i64>,
    accepted: u64,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record into the running totals.
    ///
    /// Returns `Ok(true)` if the record was accepted, `Ok(false)` if its
    /// count field did not parse and the record was dropped.
    pub fn accept(&mut self, record: &RawRecord) -> Result<bool, EngineError> {
        let Ok(count) = record.count.parse::<i64>() else {
            return Ok(false);
        };

        let total = self.totals.entry(record.category.clone()).or_insert(0);
        *total = total
            .checked_add(count)
            .ok_or_else(|| EngineError::Overflow {
                category: record.category.clone(),
            })?;

        self.accepted += 1;
        Ok(true)
    }

    /// Number of records accepted so far.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Number of distinct categories seen so far.
    pub fn category_count(&self) -> usize {
        self.totals.len()
    }

    /// The per-category totals accumulated so far.
    pub fn totals(&self) -> &HashMap<String, i64> {
        &self.totals
    }
}
