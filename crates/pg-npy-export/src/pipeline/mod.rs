//! Streaming extraction and transposition.
//!
//! - [`PagedRowIterator`]: lazily streams one table's rows, page by page
//! - [`ColumnTransposer`]: turns the row stream into one dense array per field
//!
//! Both run strictly sequentially: one table is iterated and transposed
//! before the next one begins.

mod iterator;
mod transpose;

pub use iterator::{IteratorState, PagedRowIterator};
pub use transpose::{ColumnArray, ColumnData, ColumnTransposer};
