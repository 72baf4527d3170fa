//! Row spooling for the grpby engine.
//!
//! [`OverflowQueue`] buffers the rows of the current group in decorate
//! mode and keeps memory bounded by moving its oldest rows to a temporary
//! file. [`PathResolver`] decides where that file lives.

pub mod path;
pub mod queue;

pub use path::{LocalPathResolver, PathResolver, substitute_env};
pub use queue::{
    DEFAULT_SPILL_PREFIX, DEFAULT_SPILL_THRESHOLD, OverflowQueue, SPILL_SUFFIX, SpillConfig,
    SpillStats,
};
