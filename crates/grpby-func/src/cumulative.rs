//! Running sum and average columns over emitted rows.
//!
//! Unlike group accumulators these run over the rows of a group in
//! emission order: each emitted row gets the running value up to and
//! including itself. State resets to "absent" at every group boundary.

#![allow(clippy::cast_precision_loss)]

use grpby_error::Result;
use grpby_types::{Value, ValueType, field};

use crate::binding::BoundAggregate;
use crate::kind::AggregateKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Sum,
    Average,
}

#[derive(Debug, Clone)]
struct RunningColumn {
    mode: Mode,
    source: usize,
    target: usize,
    sum_type: ValueType,
    /// NULL means absent: no value yet in this group.
    running: Value,
    count: u64,
}

impl RunningColumn {
    fn step(&mut self, subject: &Value) -> Result<Value> {
        if self.running.is_null() {
            self.running = self.sum_type.convert(subject)?;
        } else if !subject.is_null() {
            let converted = self.sum_type.convert(subject)?;
            self.running = self.running.plus(&converted)?;
        }
        if !subject.is_null() {
            self.count += 1;
        }
        Ok(match self.mode {
            Mode::Sum => self.running.clone(),
            Mode::Average => match &self.running {
                Value::Integer(i) => Value::Number(*i as f64 / self.count as f64),
                Value::Number(f) => Value::Number(f / self.count as f64),
                _ => Value::Null,
            },
        })
    }

    fn reset(&mut self) {
        self.running = Value::Null;
        self.count = 0;
    }
}

/// Computes every cumulative aggregate for rows emitted in decorate mode.
#[derive(Debug, Clone, Default)]
pub struct CumulativeComputer {
    columns: Vec<RunningColumn>,
}

impl CumulativeComputer {
    /// Collect the cumulative aggregates of `aggregates`. The aggregate at
    /// position `i` writes its value to row slot `first_target + i`.
    pub fn new(aggregates: &[BoundAggregate], first_target: usize) -> Self {
        let columns = aggregates
            .iter()
            .enumerate()
            .filter_map(|(i, bound)| {
                let mode = match bound.kind() {
                    AggregateKind::CumulativeSum => Mode::Sum,
                    AggregateKind::CumulativeAverage => Mode::Average,
                    _ => return None,
                };
                let subject_type = bound.subject_meta.as_ref().map(|m| m.value_type);
                let sum_type = if subject_type == Some(ValueType::Integer) {
                    ValueType::Integer
                } else {
                    ValueType::Number
                };
                Some(RunningColumn {
                    mode,
                    source: bound.subject_index?,
                    target: first_target + i,
                    sum_type,
                    running: Value::Null,
                    count: 0,
                })
            })
            .collect();
        Self { columns }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Forget all running values; the next row starts a new group.
    pub fn reset(&mut self) {
        for column in &mut self.columns {
            column.reset();
        }
    }

    /// Advance every running column with `row` and write the results into
    /// their target slots.
    pub fn apply(&mut self, row: &mut [Value]) -> Result<()> {
        for column in &mut self.columns {
            let value = column.step(field(row, column.source))?;
            if let Some(slot) = row.get_mut(column.target) {
                *slot = value;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use grpby_types::{RowMeta, ValueMeta};

    use super::*;
    use crate::binding::bind_all;
    use crate::kind::AggregateSpec;

    fn computer(subject_type: ValueType) -> CumulativeComputer {
        let input = RowMeta::new(vec![ValueMeta::new("v", subject_type)]);
        let specs = vec![
            AggregateSpec::new("total", Some("v"), AggregateKind::Sum).unwrap(),
            AggregateSpec::new("running", Some("v"), AggregateKind::CumulativeSum).unwrap(),
            AggregateSpec::new("avg", Some("v"), AggregateKind::CumulativeAverage).unwrap(),
        ];
        CumulativeComputer::new(&bind_all(&specs, &input).unwrap(), 1)
    }

    fn emit(c: &mut CumulativeComputer, v: Value) -> Vec<Value> {
        let mut row = vec![v, Value::Null, Value::Null, Value::Null];
        c.apply(&mut row).unwrap();
        row
    }

    #[test]
    fn running_sum_and_average() {
        let mut c = computer(ValueType::Integer);
        assert!(!c.is_empty());
        let r = emit(&mut c, Value::Integer(2));
        assert_eq!(r[2], Value::Integer(2));
        assert_eq!(r[3], Value::Number(2.0));
        let r = emit(&mut c, Value::Null);
        assert_eq!(r[2], Value::Integer(2));
        assert_eq!(r[3], Value::Number(2.0));
        let r = emit(&mut c, Value::Integer(4));
        assert_eq!(r[2], Value::Integer(6));
        assert_eq!(r[3], Value::Number(3.0));
        // non-cumulative slot untouched
        assert!(r[1].is_null());
    }

    #[test]
    fn leading_nulls_stay_null() {
        let mut c = computer(ValueType::Number);
        let r = emit(&mut c, Value::Null);
        assert!(r[2].is_null());
        assert!(r[3].is_null());
        let r = emit(&mut c, Value::Number(1.5));
        assert_eq!(r[2], Value::Number(1.5));
        assert_eq!(r[3], Value::Number(1.5));
    }

    #[test]
    fn reset_starts_over() {
        let mut c = computer(ValueType::Integer);
        emit(&mut c, Value::Integer(10));
        emit(&mut c, Value::Integer(10));
        c.reset();
        let r = emit(&mut c, Value::Integer(3));
        assert_eq!(r[2], Value::Integer(3));
        assert_eq!(r[3], Value::Number(3.0));
    }

    #[test]
    fn no_cumulative_aggregates() {
        let input = RowMeta::new(vec![ValueMeta::new("v", ValueType::Integer)]);
        let specs = vec![AggregateSpec::new("n", None, AggregateKind::CountAny).unwrap()];
        let c = CumulativeComputer::new(&bind_all(&specs, &input).unwrap(), 1);
        assert!(c.is_empty());
    }
}
