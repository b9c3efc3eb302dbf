//! Page fetch outcome and the row-count contract of a loaded page.

use std::fmt;

use tracing::warn;

use super::transaction::TransactionRecord;

/// Result of fetching one pagination index.
#[derive(Debug, Clone, PartialEq)]
pub enum PageFetchOutcome {
    /// Data rows (header already discarded, malformed rows dropped)
    Success(Vec<TransactionRecord>),
    /// No table rows at all, even after the generate trigger
    EmptyNoContent,
    /// Only the header row: nothing left to collect
    LastPage,
    /// Navigation / transport failure or fetch timeout
    FetchError(String),
}

impl PageFetchOutcome {
    pub fn fetch_error(message: impl Into<String>) -> Self {
        Self::FetchError(message.into())
    }

    pub fn row_count(&self) -> usize {
        match self {
            Self::Success(rows) => rows.len(),
            _ => 0,
        }
    }
}

impl fmt::Display for PageFetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(rows) => write!(f, "success ({} rows)", rows.len()),
            Self::EmptyNoContent => write!(f, "no content"),
            Self::LastPage => write!(f, "last page"),
            Self::FetchError(message) => write!(f, "fetch error: {message}"),
        }
    }
}

/// Classify the raw `<tr>` rows of a loaded page.
///
/// - 0 rows: [`PageFetchOutcome::EmptyNoContent`]
/// - 1 row: [`PageFetchOutcome::LastPage`] (header only)
/// - 2+ rows: header discarded, each remaining row parsed; rows without
///   exactly three cells are logged and dropped.
pub fn classify_rows<S: AsRef<str>>(rows: &[Vec<S>]) -> PageFetchOutcome {
    match rows {
        [] => PageFetchOutcome::EmptyNoContent,
        [_header] => PageFetchOutcome::LastPage,
        [_header, data @ ..] => {
            let records = data
                .iter()
                .enumerate()
                .filter_map(|(position, cells)| {
                    let record = TransactionRecord::from_cells(cells.as_slice());
                    if record.is_none() {
                        warn!(
                            "⚠️ Dropping malformed row #{} ({} cells)",
                            position + 1,
                            cells.len()
                        );
                    }
                    record
                })
                .collect();
            PageFetchOutcome::Success(records)
        }
    }
}
