//! Paged row streaming.
//!
//! [`PagedRowIterator`] streams one table page by page so that a table is
//! never held in memory as a whole. The offset advances by the number of
//! rows a page actually returned, and every page query carries an explicit
//! ordering (primary key, or all output columns when there is none).

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::core::{RawValue, Row, TableMetadata, ValueNormalizer};
use crate::error::ExportError;
use crate::source::{PageOrder, PageRequest, PageSource};

/// Iterator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorState {
    /// Nothing fetched yet.
    Idle,
    /// A page query is in flight.
    Fetching,
    /// Rows are being served from the current page.
    Streaming,
    /// A fetch returned no rows, or the iterator was closed.
    Exhausted,
    /// A fetch failed; see [`PagedRowIterator::error`].
    Failed,
}

impl IteratorState {
    /// Check if no further rows will be produced.
    pub fn is_terminal(self) -> bool {
        matches!(self, IteratorState::Exhausted | IteratorState::Failed)
    }
}

/// Lazily streams the rows of one table.
pub struct PagedRowIterator<'a, S: PageSource + ?Sized> {
    source: &'a S,
    table: &'a TableMetadata,
    page_size: usize,
    order: PageOrder,
    offset: u64,
    page: VecDeque<Vec<RawValue>>,
    state: IteratorState,
    error: Option<ExportError>,
    normalizer: ValueNormalizer,
    pages_fetched: u64,
    queries_issued: u64,
}

impl<'a, S: PageSource + ?Sized> PagedRowIterator<'a, S> {
    /// Create an iterator over `table` fetching `page_size` rows at a time.
    ///
    /// A page size of zero is treated as one.
    pub fn new(source: &'a S, table: &'a TableMetadata, page_size: usize) -> Self {
        let order = if table.has_pk() {
            PageOrder::PrimaryKey(table.primary_key.clone())
        } else {
            warn!(
                "Table {} has no primary key; paging in full-row order, duplicate rows are indistinguishable",
                table.table_name
            );
            PageOrder::AllColumns
        };

        Self {
            source,
            table,
            page_size: page_size.max(1),
            order,
            offset: 0,
            page: VecDeque::new(),
            state: IteratorState::Idle,
            error: None,
            normalizer: ValueNormalizer::new(),
            pages_fetched: 0,
            queries_issued: 0,
        }
    }

    /// Next normalized row, or `None` once exhausted or failed.
    ///
    /// After a failure this keeps returning `None` without retrying.
    pub async fn next_row(&mut self) -> Option<Row> {
        if self.state.is_terminal() {
            return None;
        }

        if self.page.is_empty() {
            self.fetch_page().await;
            if self.state.is_terminal() {
                return None;
            }
        }

        let raw = self.page.pop_front()?;
        Some(self.normalize_row(raw))
    }

    /// Error that moved the iterator to [`IteratorState::Failed`].
    pub fn error(&self) -> Option<&ExportError> {
        self.error.as_ref()
    }

    /// Consume the iterator, yielding the failure that stopped it, if any.
    ///
    /// While the iterator is alive its error stays readable through
    /// [`error`](Self::error).
    pub fn into_error(self) -> Option<ExportError> {
        self.error
    }

    /// Release the buffered page. Further calls to `next_row` return `None`.
    pub fn close(&mut self) {
        self.page = VecDeque::new();
        if self.state != IteratorState::Failed {
            self.state = IteratorState::Exhausted;
        }
    }

    pub fn state(&self) -> IteratorState {
        self.state
    }

    /// Rows fetched so far; equals the table's row count after exhaustion.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of fetches that returned at least one row.
    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched
    }

    /// Number of page queries issued, including the final empty one.
    pub fn queries_issued(&self) -> u64 {
        self.queries_issued
    }

    /// Conversion warnings seen while normalizing rows.
    pub fn warnings(&self) -> u64 {
        self.normalizer.warnings()
    }

    pub fn table(&self) -> &TableMetadata {
        self.table
    }

    async fn fetch_page(&mut self) {
        self.state = IteratorState::Fetching;
        self.queries_issued += 1;

        let request = PageRequest {
            table: &self.table.table_name,
            fields: &self.table.fields,
            order: &self.order,
            limit: self.page_size,
            offset: self.offset,
        };

        match self.source.fetch_page(request).await {
            Ok(rows) if rows.is_empty() => {
                debug!(
                    "{}: exhausted after {} rows in {} pages",
                    self.table.table_name, self.offset, self.pages_fetched
                );
                self.state = IteratorState::Exhausted;
            }
            Ok(rows) => {
                self.offset += rows.len() as u64;
                self.pages_fetched += 1;
                debug!(
                    "{}: page {} returned {} rows (offset now {})",
                    self.table.table_name,
                    self.pages_fetched,
                    rows.len(),
                    self.offset
                );
                self.page = rows.into();
                self.state = IteratorState::Streaming;
            }
            Err(e) => {
                let e = match e {
                    ExportError::Iteration { .. } => e,
                    other => ExportError::iteration(&self.table.table_name, other),
                };
                self.page = VecDeque::new();
                self.error = Some(e);
                self.state = IteratorState::Failed;
            }
        }
    }

    fn normalize_row(&mut self, raw: Vec<RawValue>) -> Row {
        let mut row = Row::with_capacity(self.table.fields.len());
        let mut values = raw.into_iter();
        for field in &self.table.fields {
            let value = values.next().unwrap_or(RawValue::Null);
            let normalized = self
                .normalizer
                .normalize(&field.field_name, field.data_type, value);
            row.insert(field.field_name.clone(), normalized);
        }
        row
    }
}
