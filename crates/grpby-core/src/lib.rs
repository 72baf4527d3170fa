//! Streaming group-by aggregation.
//!
//! [`GroupBy`] consumes rows clustered by a set of group fields and emits
//! either one summary row per group or every input row decorated with its
//! group's aggregates. Groups are detected by adjacency, so memory use does
//! not grow with the number of groups; in decorate mode the rows of the
//! current group are buffered in a queue that spills to disk.
//!
//! ```no_run
//! use grpby_core::{GroupBy, GroupByConfig, VecSink, VecSource};
//! use grpby_types::{Cx, RowMeta};
//!
//! # fn demo(meta: RowMeta, rows: Vec<grpby_types::Row>) -> grpby_error::Result<()> {
//! let config = GroupByConfig::from_json(
//!     r#"{"group_fields": ["region"],
//!         "aggregates": [{"name": "total", "subject": "amount", "type": "SUM"}]}"#,
//! )?;
//! let mut op = GroupBy::new(config, meta.clone())?;
//! let mut sink = VecSink::new();
//! op.run(&mut VecSource::new(meta, rows), &mut sink, &Cx::new())?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod operator;
pub mod pipeline;
pub mod state;

pub use config::GroupByConfig;
pub use grpby_error::{GroupByError, Result};
pub use grpby_func::{AggregateKind, AggregateOptions, AggregateSpec};
pub use grpby_spool::{LocalPathResolver, PathResolver, SpillConfig};
pub use operator::{GroupBy, GroupByStats, Phase, StepOutcome};
pub use pipeline::{RowSink, RowSource, VecSink, VecSource};
pub use state::RunState;
