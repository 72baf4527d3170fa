//! Aggregate functions for the grpby engine.
//!
//! [`AggregateSpec`] is the configured form of an aggregate. Binding it to
//! an input layout yields a [`BoundAggregate`], from which the operator
//! seeds one [`Accumulator`] per group. Cumulative kinds are evaluated per
//! emitted row by [`CumulativeComputer`] instead.

pub mod accumulator;
pub mod binding;
pub mod cumulative;
pub mod kind;
pub mod options;
pub mod percentile;

pub use accumulator::{Accumulator, AggregateState, COMMA_SEPARATOR};
pub use binding::{BoundAggregate, bind, bind_all};
pub use cumulative::CumulativeComputer;
pub use kind::{AggregateKind, AggregateSpec, MEDIAN_PERCENTILE};
pub use options::{AggregateOptions, ENV_MIN_NULL_IS_VALUED, ENV_NULLS_ARE_ZERO};
