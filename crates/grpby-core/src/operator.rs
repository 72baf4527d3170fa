//! The streaming group-by operator.
//!
//! Input arrives sorted (or at least clustered) by the group fields. A
//! group ends when a row with a different key shows up, so the operator
//! keeps the most recent row *pending* and only folds it into the group
//! once the next row (or end of stream) has been seen:
//!
//! ```text
//! AwaitingFirstRow --row--> Accumulating{pending}
//! Accumulating{p} --row r--> accumulate p; same key? keep going : close group, start new one
//! Accumulating{p} --end--> accumulate p; Draining (close last group) --> Done
//! ```
//!
//! In summary mode a closed group yields one row: key fields then
//! aggregates. In decorate mode every row of the group is buffered in an
//! [`OverflowQueue`] and replayed on close with the aggregates, an
//! optional line number and cumulative columns appended.

use std::fmt;
use std::sync::Arc;

use grpby_error::{GroupByError, Result};
use grpby_func::{BoundAggregate, CumulativeComputer, bind_all};
use grpby_spool::{LocalPathResolver, OverflowQueue, PathResolver};
use grpby_types::{Cx, Row, RowMeta, Value, ValueMeta, ValueType, field};
use tracing::{debug, debug_span, error, info, warn};

use crate::config::GroupByConfig;
use crate::pipeline::{RowSink, RowSource};
use crate::state::RunState;

/// Result of feeding one step to [`GroupBy::process`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Ready for the next row.
    Continue,
    /// End of stream handled; output is complete.
    Done,
}

/// Where the operator is in its one-row-delayed cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    AwaitingFirstRow,
    /// A group is open; `pending` has been read but not yet accumulated.
    Accumulating { pending: Row },
    /// The final group is being closed.
    Draining,
    Done,
}

/// Counters for one operator instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupByStats {
    pub rows_read: u64,
    pub rows_written: u64,
    pub groups_closed: u64,
    pub rows_spilled: u64,
    /// Largest number of buffered rows held in memory at once.
    pub peak_in_memory: usize,
}

/// Streaming group-by over clustered input.
pub struct GroupBy {
    config: GroupByConfig,
    input_meta: RowMeta,
    output_meta: RowMeta,
    group_indexes: Vec<usize>,
    group_metas: Vec<ValueMeta>,
    aggregates: Vec<BoundAggregate>,
    cumulative: CumulativeComputer,
    resolver: Arc<dyn PathResolver>,
    phase: Phase,
    run: Option<RunState>,
    queue: Option<OverflowQueue>,
    stats: GroupByStats,
}

impl fmt::Debug for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupBy")
            .field("group_fields", &self.config.group_fields)
            .field("aggregates", &self.aggregates.len())
            .field("pass_all_rows", &self.config.pass_all_rows)
            .field("phase", &self.phase)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl GroupBy {
    /// Resolve every group field and aggregate subject against
    /// `input_meta`. Any failure is a configuration error, logged once;
    /// no row has been read at that point.
    pub fn new(config: GroupByConfig, input_meta: RowMeta) -> Result<Self> {
        Self::build(config, input_meta)
            .inspect_err(|e| error!(error = %e, "group by configuration rejected"))
    }

    fn build(config: GroupByConfig, input_meta: RowMeta) -> Result<Self> {
        config.validate()?;
        let mut group_indexes = Vec::with_capacity(config.group_fields.len());
        let mut group_metas = Vec::with_capacity(config.group_fields.len());
        for name in &config.group_fields {
            let index = input_meta.require(name, || GroupByError::GroupFieldNotFound {
                name: name.clone(),
            })?;
            group_indexes.push(index);
            group_metas.push(input_meta.fields()[index].clone());
        }
        let aggregates = bind_all(&config.aggregates, &input_meta)?;
        let output_meta = output_layout(&config, &input_meta, &group_metas, &aggregates);
        let cumulative = CumulativeComputer::new(&aggregates, input_meta.len());

        debug!(
            group_fields = group_indexes.len(),
            aggregates = aggregates.len(),
            pass_all_rows = config.pass_all_rows,
            spill_threshold = config.spill.threshold,
            "group by configured"
        );

        Ok(Self {
            config,
            input_meta,
            output_meta,
            group_indexes,
            group_metas,
            aggregates,
            cumulative,
            resolver: Arc::new(LocalPathResolver),
            phase: Phase::AwaitingFirstRow,
            run: None,
            queue: None,
            stats: GroupByStats::default(),
        })
    }

    /// Use `resolver` to locate the spill directory.
    #[must_use]
    pub fn with_path_resolver(mut self, resolver: Arc<dyn PathResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &GroupByConfig {
        &self.config
    }

    /// Layout of emitted rows.
    pub fn output_meta(&self) -> &RowMeta {
        &self.output_meta
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    pub fn stats(&self) -> GroupByStats {
        let mut stats = self.stats;
        if let Some(queue) = &self.queue {
            let spill = queue.stats();
            stats.rows_spilled = spill.rows_spilled;
            stats.peak_in_memory = spill.peak_in_memory;
        }
        stats
    }

    /// Feed the next input row, or `None` for end of stream.
    ///
    /// Any error is fatal: the operator is left done and should be
    /// disposed.
    pub fn process(&mut self, row: Option<Row>, sink: &mut dyn RowSink) -> Result<StepOutcome> {
        match (std::mem::replace(&mut self.phase, Phase::Done), row) {
            (Phase::AwaitingFirstRow, Some(row)) => {
                self.stats.rows_read += 1;
                self.begin_group(&row);
                self.phase = Phase::Accumulating { pending: row };
                Ok(StepOutcome::Continue)
            }
            (Phase::AwaitingFirstRow, None) => {
                if self.stats.rows_read == 0 {
                    self.give_back_one_row(sink)?;
                }
                self.finish(sink);
                Ok(StepOutcome::Done)
            }
            (Phase::Accumulating { pending }, Some(row)) => {
                self.stats.rows_read += 1;
                let same = self.same_group(&pending, &row);
                self.absorb(pending)?;
                if !same {
                    self.close_group(sink)?;
                    self.begin_group(&row);
                }
                self.phase = Phase::Accumulating { pending: row };
                Ok(StepOutcome::Continue)
            }
            (Phase::Accumulating { pending }, None) => {
                self.absorb(pending)?;
                self.phase = Phase::Draining;
                self.close_group(sink)?;
                self.finish(sink);
                Ok(StepOutcome::Done)
            }
            (Phase::Draining | Phase::Done, None) => Ok(StepOutcome::Done),
            (Phase::Draining | Phase::Done, Some(_)) => Err(GroupByError::internal(
                "row received after the group by finished",
            )),
        }
    }

    /// Close the open group as if the stream ended, then wait for a new
    /// first row. Output is not marked done.
    pub fn batch_complete(&mut self, sink: &mut dyn RowSink) -> Result<()> {
        match std::mem::replace(&mut self.phase, Phase::Done) {
            Phase::Accumulating { pending } => {
                self.absorb(pending)?;
                self.close_group(sink)?;
            }
            Phase::AwaitingFirstRow => {}
            Phase::Draining | Phase::Done => return Ok(()),
        }
        if let Some(queue) = self.queue.as_mut() {
            queue.teardown();
        }
        debug!(groups = self.stats.groups_closed, "batch complete");
        self.phase = Phase::AwaitingFirstRow;
        Ok(())
    }

    /// Pull rows from `source` until end of stream, checking `cx` for
    /// cancellation before each row.
    pub fn run(
        &mut self,
        source: &mut dyn RowSource,
        sink: &mut dyn RowSink,
        cx: &Cx,
    ) -> Result<GroupByStats> {
        loop {
            if let Err(cancelled) = cx.checkpoint() {
                warn!(
                    reason = ?cancelled.reason,
                    rows_read = self.stats.rows_read,
                    "group by cancelled"
                );
                self.dispose();
                return Err(GroupByError::Cancelled);
            }
            let step = source
                .next_row()
                .and_then(|row| self.process(row, sink));
            match step {
                Ok(StepOutcome::Continue) => {}
                Ok(StepOutcome::Done) => return Ok(self.stats()),
                Err(e) => {
                    error!(error = %e, rows_read = self.stats.rows_read, "group by failed");
                    self.dispose();
                    return Err(e);
                }
            }
        }
    }

    /// Release the open group and delete any spill file. Safe to call more
    /// than once.
    pub fn dispose(&mut self) {
        if let Some(queue) = self.queue.as_mut() {
            queue.teardown();
        }
        self.run = None;
        self.phase = Phase::Done;
    }

    fn same_group(&self, a: &[Value], b: &[Value]) -> bool {
        self.group_indexes
            .iter()
            .zip(&self.group_metas)
            .all(|(&i, meta)| meta.same(field(a, i), field(b, i)))
    }

    fn begin_group(&mut self, first: &[Value]) {
        self.run = Some(RunState::start(
            first,
            &self.group_indexes,
            &self.aggregates,
            self.config.options,
        ));
        self.cumulative.reset();
        if self.config.pass_all_rows && self.queue.is_none() {
            self.queue = Some(OverflowQueue::with_resolver(
                self.config.spill.clone(),
                Arc::clone(&self.resolver),
            ));
        }
    }

    /// Fold the pending row into the open group and buffer it for replay.
    fn absorb(&mut self, row: Row) -> Result<()> {
        let Some(run) = self.run.as_mut() else {
            return Err(GroupByError::internal("no open group"));
        };
        run.accumulate(&row)?;
        if self.config.pass_all_rows {
            let Some(queue) = self.queue.as_mut() else {
                return Err(GroupByError::internal("decorate mode without a row buffer"));
            };
            queue.push(row)?;
        }
        Ok(())
    }

    fn close_group(&mut self, sink: &mut dyn RowSink) -> Result<()> {
        let Some(mut run) = self.run.take() else {
            return Ok(());
        };
        self.stats.groups_closed += 1;
        let _span = debug_span!(
            "group_close",
            group = self.stats.groups_closed,
            rows = run.rows()
        )
        .entered();
        let values = run.finalize();
        if self.config.pass_all_rows {
            self.replay(&values, sink)?;
        } else {
            let mut out = run.group_key().to_vec();
            out.extend(values);
            sink.emit(out)?;
            self.stats.rows_written += 1;
        }
        debug!("group closed");
        Ok(())
    }

    /// Emit every buffered row of the closing group, decorated.
    fn replay(&mut self, values: &[Value], sink: &mut dyn RowSink) -> Result<()> {
        // Taken out while draining; dropping it on error deletes the file.
        let Some(mut queue) = self.queue.take() else {
            return Err(GroupByError::internal("decorate mode without a row buffer"));
        };
        let with_line = self.config.line_number_field().is_some();
        let mut line = 0i64;
        while let Some(mut row) = queue.pop()? {
            row.resize(self.input_meta.len(), Value::Null);
            row.extend_from_slice(values);
            if with_line {
                line += 1;
                row.push(Value::Integer(line));
            }
            self.cumulative.apply(&mut row)?;
            sink.emit(row)?;
            self.stats.rows_written += 1;
        }
        queue.teardown();
        self.queue = Some(queue);
        Ok(())
    }

    /// Summary mode over an empty input may still owe one row.
    fn give_back_one_row(&mut self, sink: &mut dyn RowSink) -> Result<()> {
        if self.config.pass_all_rows || !self.config.always_give_back_one_row {
            return Ok(());
        }
        let mut run = RunState::empty(
            self.group_indexes.len(),
            &self.aggregates,
            self.config.options,
        );
        let mut out = run.group_key().to_vec();
        out.extend(run.finalize());
        sink.emit(out)?;
        self.stats.rows_written += 1;
        debug!("empty input, one row given back");
        Ok(())
    }

    fn finish(&mut self, sink: &mut dyn RowSink) {
        if let Some(queue) = self.queue.as_mut() {
            queue.teardown();
        }
        self.phase = Phase::Done;
        sink.output_done();
        let stats = self.stats();
        info!(
            rows_read = stats.rows_read,
            rows_written = stats.rows_written,
            groups = stats.groups_closed,
            rows_spilled = stats.rows_spilled,
            "group by finished"
        );
    }
}

impl Drop for GroupBy {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn output_layout(
    config: &GroupByConfig,
    input: &RowMeta,
    group_metas: &[ValueMeta],
    aggregates: &[BoundAggregate],
) -> RowMeta {
    let mut out = if config.pass_all_rows {
        input.clone()
    } else {
        group_metas.iter().cloned().collect()
    };
    for bound in aggregates {
        out.push(bound.output_meta.clone());
    }
    if let Some(line) = config.line_number_field() {
        out.push(ValueMeta::new(line, ValueType::Integer));
    }
    out
}
