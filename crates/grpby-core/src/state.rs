//! Per-group run state.

use grpby_error::Result;
use grpby_func::{Accumulator, AggregateOptions, BoundAggregate};
use grpby_types::{Row, Value, field};

/// Group-key snapshot and accumulators of the group being built. A new
/// one is started at every group boundary.
#[derive(Debug, Clone)]
pub struct RunState {
    group_key: Row,
    accumulators: Vec<Accumulator>,
    rows: u64,
}

impl RunState {
    /// State for a group whose first row is `first`.
    pub fn start(
        first: &[Value],
        group_indexes: &[usize],
        aggregates: &[BoundAggregate],
        options: AggregateOptions,
    ) -> Self {
        Self {
            group_key: group_indexes
                .iter()
                .map(|&i| field(first, i).clone())
                .collect(),
            accumulators: aggregates
                .iter()
                .map(|bound| Accumulator::seed(bound, Some(first), options))
                .collect(),
            rows: 0,
        }
    }

    /// State for a group with no rows: NULL key values and unseeded
    /// accumulators.
    pub fn empty(group_len: usize, aggregates: &[BoundAggregate], options: AggregateOptions) -> Self {
        Self {
            group_key: vec![Value::Null; group_len],
            accumulators: aggregates
                .iter()
                .map(|bound| Accumulator::seed(bound, None, options))
                .collect(),
            rows: 0,
        }
    }

    pub fn accumulate(&mut self, row: &[Value]) -> Result<()> {
        for acc in &mut self.accumulators {
            acc.accumulate(row)?;
        }
        self.rows += 1;
        Ok(())
    }

    /// Finalized aggregate values, in configuration order.
    pub fn finalize(&mut self) -> Row {
        self.accumulators.iter_mut().map(Accumulator::finalize).collect()
    }

    pub fn group_key(&self) -> &[Value] {
        &self.group_key
    }

    /// Rows accumulated so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }
}
