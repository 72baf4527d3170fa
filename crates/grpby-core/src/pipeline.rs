//! Row source and sink traits the operator is driven through.

use grpby_error::Result;
use grpby_types::{Row, RowMeta};

/// Upstream side of the operator.
pub trait RowSource {
    /// Layout of every row this source yields.
    fn row_meta(&self) -> &RowMeta;

    /// The next row, or `None` at end of stream.
    fn next_row(&mut self) -> Result<Option<Row>>;
}

/// Downstream side of the operator.
pub trait RowSink {
    /// Accept one output row.
    fn emit(&mut self, row: Row) -> Result<()>;

    /// No further rows will be emitted.
    fn output_done(&mut self) {}
}

/// In-memory source over a vector of rows.
#[derive(Debug, Clone)]
pub struct VecSource {
    meta: RowMeta,
    rows: std::vec::IntoIter<Row>,
}

impl VecSource {
    pub fn new(meta: RowMeta, rows: Vec<Row>) -> Self {
        Self {
            meta,
            rows: rows.into_iter(),
        }
    }
}

impl RowSource for VecSource {
    fn row_meta(&self) -> &RowMeta {
        &self.meta
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.next())
    }
}

/// Sink collecting everything it is given.
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    pub rows: Vec<Row>,
    pub done: bool,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl RowSink for VecSink {
    fn emit(&mut self, row: Row) -> Result<()> {
        self.rows.push(row);
        Ok(())
    }

    fn output_done(&mut self) {
        self.done = true;
    }
}
