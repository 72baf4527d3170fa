//! Per-group aggregate accumulators.
//!
//! Every aggregate goes through the same lifecycle: [`Accumulator::seed`]
//! with the group's first row, [`Accumulator::accumulate`] once for every
//! row of the group (the first row included), then
//! [`Accumulator::finalize`]. The concrete algorithm lives in
//! [`AggregateState`], one variant per [`AggregateKind`], dispatched by
//! `match`.

#![allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]

use std::cmp::Ordering;
use std::collections::BTreeSet;

use grpby_error::Result;
use grpby_types::{DistinctValue, NULL, Value, ValueMeta, ValueType, field};

use crate::binding::BoundAggregate;
use crate::kind::{AggregateKind, MEDIAN_PERCENTILE};
use crate::options::AggregateOptions;
use crate::percentile;

/// Separator used by `CONCAT_COMMA`.
pub const COMMA_SEPARATOR: &str = ",";

// ── Per-kind state ─────────────────────────────────────────────────────────

/// Running sum in the output type. NULL until the first non-NULL subject.
#[derive(Debug, Clone)]
pub struct SumState {
    total: Value,
    target: ValueType,
}

impl SumState {
    fn add(&mut self, subject: &Value) -> Result<()> {
        if subject.is_null() {
            return Ok(());
        }
        let converted = self.target.convert(subject)?;
        self.total = if self.total.is_null() {
            converted
        } else {
            self.total.plus(&converted)?
        };
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct AverageState {
    sum: f64,
    count: u64,
}

impl AverageState {
    fn add(&mut self, subject: &Value) -> Result<()> {
        if !subject.is_null() {
            self.sum += subject.to_number()?;
            self.count += 1;
        }
        Ok(())
    }

    fn result(&self) -> Value {
        if self.count == 0 {
            Value::Null
        } else {
            Value::Number(self.sum / self.count as f64)
        }
    }
}

/// Welford's online mean and sum of squared deviations.
#[derive(Debug, Clone, Default)]
pub struct WelfordState {
    count: u64,
    mean: f64,
    sum_sq: f64,
}

impl WelfordState {
    fn add(&mut self, subject: &Value) -> Result<()> {
        if subject.is_null() {
            return Ok(());
        }
        let x = subject.to_number()?;
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.sum_sq += delta * (x - self.mean);
        Ok(())
    }

    fn population(&self) -> Value {
        if self.count == 0 {
            return Value::Null;
        }
        Value::Number((self.sum_sq / self.count as f64).sqrt())
    }

    /// With a single value this divides zero by zero and yields NaN.
    fn sample(&self) -> Value {
        if self.count == 0 {
            return Value::Null;
        }
        Value::Number((self.sum_sq / (self.count - 1) as f64).sqrt())
    }
}

/// Every non-NULL subject of the group, held in memory.
#[derive(Debug, Clone)]
pub struct PercentileState {
    values: Vec<f64>,
    percentile: f64,
}

impl PercentileState {
    fn new(percentile: f64) -> Self {
        Self {
            values: Vec::new(),
            percentile,
        }
    }

    fn add(&mut self, subject: &Value) -> Result<()> {
        if !subject.is_null() {
            self.values.push(subject.to_number()?);
        }
        Ok(())
    }

    fn sorted(&mut self) -> &[f64] {
        self.values.sort_by(f64::total_cmp);
        &self.values
    }

    fn interpolated(&mut self) -> Value {
        let p = self.percentile;
        Value::Number(percentile::interpolated(self.sorted(), p))
    }

    fn nearest_rank(&mut self) -> Value {
        let p = self.percentile;
        percentile::nearest_rank(self.sorted(), p).map_or(Value::Null, Value::Number)
    }
}

/// Current MIN or MAX, compared through the subject column's ordering.
#[derive(Debug, Clone)]
pub struct ExtremeState {
    value: Value,
    meta: ValueMeta,
    null_is_valued: bool,
}

impl ExtremeState {
    /// Replace the current value when `subject` wins in direction `want`.
    fn offer(&mut self, subject: &Value, want: Ordering) {
        if !self.null_is_valued {
            if subject.is_null() {
                return;
            }
            if self.value.is_null() {
                self.value = subject.clone();
                return;
            }
        }
        // The column comparison follows the upstream sort direction; undo
        // that here so MIN and MAX stay the true extremes.
        let mut ord = self.meta.compare(subject, &self.value);
        if self.meta.sort_descending {
            ord = ord.reverse();
        }
        if ord == want {
            self.value = subject.clone();
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CountState {
    count: i64,
}

#[derive(Debug, Clone, Default)]
pub struct DistinctState {
    seen: BTreeSet<DistinctValue>,
}

/// FIRST/LAST family: a single remembered value.
#[derive(Debug, Clone)]
pub struct PickState {
    value: Value,
}

#[derive(Debug, Clone)]
pub struct ConcatState {
    text: String,
    separator: String,
}

impl ConcatState {
    fn new(separator: &str) -> Self {
        Self {
            text: String::new(),
            separator: separator.to_owned(),
        }
    }

    fn add(&mut self, subject: &Value) {
        if subject.is_null() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push_str(&self.separator);
        }
        self.text.push_str(&subject.to_text());
    }
}

/// The algorithm behind one aggregate, one variant per kind.
#[derive(Debug, Clone)]
pub enum AggregateState {
    Sum(SumState),
    Average(AverageState),
    Median(PercentileState),
    Percentile(PercentileState),
    PercentileNearestRank(PercentileState),
    Min(ExtremeState),
    Max(ExtremeState),
    CountAll(CountState),
    CountAny(CountState),
    CountDistinct(DistinctState),
    First(PickState),
    Last(PickState),
    FirstInclNull(PickState),
    LastInclNull(PickState),
    ConcatComma(ConcatState),
    ConcatString(ConcatState),
    /// Computed per emitted row by the cumulative column computer.
    CumulativeSum,
    /// Computed per emitted row by the cumulative column computer.
    CumulativeAverage,
    StdDevPopulation(WelfordState),
    StdDevSample(WelfordState),
}

// ── Accumulator ────────────────────────────────────────────────────────────

/// One aggregate's running state for the current group.
#[derive(Debug, Clone)]
pub struct Accumulator {
    subject: Option<usize>,
    output_type: ValueType,
    nulls_are_zero: bool,
    state: AggregateState,
}

impl Accumulator {
    /// Fresh accumulator for a new group. `first` is the group's first row;
    /// `None` seeds an empty group (only used to give back a row for an
    /// empty input).
    pub fn seed(bound: &BoundAggregate, first: Option<&[Value]>, options: AggregateOptions) -> Self {
        let seed_value = || match (first, bound.subject_index) {
            (Some(row), Some(i)) => field(row, i).clone(),
            _ => Value::Null,
        };
        let pick = || PickState {
            value: seed_value(),
        };
        let extreme = || ExtremeState {
            value: seed_value(),
            meta: bound
                .subject_meta
                .clone()
                .unwrap_or_else(|| bound.output_meta.clone()),
            null_is_valued: options.min_null_is_valued,
        };
        let state = match bound.kind() {
            AggregateKind::Sum => AggregateState::Sum(SumState {
                total: Value::Null,
                target: bound.output_meta.value_type,
            }),
            AggregateKind::Average => AggregateState::Average(AverageState::default()),
            AggregateKind::Median => {
                AggregateState::Median(PercentileState::new(MEDIAN_PERCENTILE))
            }
            AggregateKind::Percentile(p) => AggregateState::Percentile(PercentileState::new(*p)),
            AggregateKind::PercentileNearestRank(p) => {
                AggregateState::PercentileNearestRank(PercentileState::new(*p))
            }
            AggregateKind::Min => AggregateState::Min(extreme()),
            AggregateKind::Max => AggregateState::Max(extreme()),
            AggregateKind::CountAll => AggregateState::CountAll(CountState::default()),
            AggregateKind::CountAny => AggregateState::CountAny(CountState::default()),
            AggregateKind::CountDistinct => AggregateState::CountDistinct(DistinctState::default()),
            AggregateKind::First => AggregateState::First(pick()),
            AggregateKind::Last => AggregateState::Last(pick()),
            AggregateKind::FirstInclNull => AggregateState::FirstInclNull(pick()),
            AggregateKind::LastInclNull => AggregateState::LastInclNull(pick()),
            AggregateKind::ConcatComma => {
                AggregateState::ConcatComma(ConcatState::new(COMMA_SEPARATOR))
            }
            AggregateKind::ConcatString(sep) => AggregateState::ConcatString(ConcatState::new(sep)),
            AggregateKind::CumulativeSum => AggregateState::CumulativeSum,
            AggregateKind::CumulativeAverage => AggregateState::CumulativeAverage,
            AggregateKind::StdDevPopulation => {
                AggregateState::StdDevPopulation(WelfordState::default())
            }
            AggregateKind::StdDevSample => AggregateState::StdDevSample(WelfordState::default()),
        };
        Self {
            subject: bound.subject_index,
            output_type: bound.output_meta.value_type,
            nulls_are_zero: options.nulls_are_zero,
            state,
        }
    }

    pub fn state(&self) -> &AggregateState {
        &self.state
    }

    /// Fold one row of the group into the state.
    pub fn accumulate(&mut self, row: &[Value]) -> Result<()> {
        let subject = self.subject.map_or(&NULL, |i| field(row, i));
        match &mut self.state {
            AggregateState::Sum(s) => s.add(subject)?,
            AggregateState::Average(s) => s.add(subject)?,
            AggregateState::Median(s)
            | AggregateState::Percentile(s)
            | AggregateState::PercentileNearestRank(s) => s.add(subject)?,
            AggregateState::StdDevPopulation(s) | AggregateState::StdDevSample(s) => {
                s.add(subject)?;
            }
            AggregateState::Min(s) => s.offer(subject, Ordering::Less),
            AggregateState::Max(s) => s.offer(subject, Ordering::Greater),
            AggregateState::CountAll(s) => {
                if !subject.is_null() {
                    s.count += 1;
                }
            }
            AggregateState::CountAny(s) => s.count += 1,
            AggregateState::CountDistinct(s) => {
                if !subject.is_null() {
                    s.seen.insert(DistinctValue(subject.clone()));
                }
            }
            AggregateState::First(s) => {
                if s.value.is_null() && !subject.is_null() {
                    s.value = subject.clone();
                }
            }
            AggregateState::Last(s) => {
                if !subject.is_null() {
                    s.value = subject.clone();
                }
            }
            AggregateState::LastInclNull(s) => s.value = subject.clone(),
            AggregateState::ConcatComma(s) | AggregateState::ConcatString(s) => s.add(subject),
            AggregateState::FirstInclNull(_)
            | AggregateState::CumulativeSum
            | AggregateState::CumulativeAverage => {}
        }
        Ok(())
    }

    /// Result for the group. Calling it again without new input gives the
    /// same value.
    pub fn finalize(&mut self) -> Value {
        let value = match &mut self.state {
            AggregateState::Sum(s) => s.total.clone(),
            AggregateState::Average(s) => s.result(),
            AggregateState::Median(s) | AggregateState::Percentile(s) => s.interpolated(),
            AggregateState::PercentileNearestRank(s) => s.nearest_rank(),
            AggregateState::StdDevPopulation(s) => s.population(),
            AggregateState::StdDevSample(s) => s.sample(),
            AggregateState::Min(s) | AggregateState::Max(s) => s.value.clone(),
            AggregateState::CountAll(s) | AggregateState::CountAny(s) => Value::Integer(s.count),
            AggregateState::CountDistinct(s) => Value::Integer(s.seen.len() as i64),
            AggregateState::First(s)
            | AggregateState::Last(s)
            | AggregateState::FirstInclNull(s)
            | AggregateState::LastInclNull(s) => s.value.clone(),
            AggregateState::ConcatComma(s) | AggregateState::ConcatString(s) => {
                Value::Text(s.text.clone())
            }
            AggregateState::CumulativeSum | AggregateState::CumulativeAverage => Value::Null,
        };
        if value.is_null() && self.nulls_are_zero {
            self.output_type.zero()
        } else {
            value
        }
    }
}
