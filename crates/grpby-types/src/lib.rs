//! Typed values, row layouts, the spill row codec and the cancellation
//! context shared by every grpby crate.

pub mod cx;
pub mod meta;
pub mod record;
pub mod value;

pub use cx::{CancelReason, Cancelled, Cx};
pub use meta::{RowMeta, ValueMeta, ValueType};
pub use record::{read_row, write_row};
pub use value::{DistinctValue, NULL, Value};

/// A row is an ordered sequence of values laid out by a [`RowMeta`].
pub type Row = Vec<Value>;

/// Value at `index`, or NULL when the row is shorter than its layout.
#[inline]
pub fn field(row: &[Value], index: usize) -> &Value {
    row.get(index).unwrap_or(&NULL)
}
