//! Source readers: fetch the worksheet as a [`RawSheet`].
//!
//! All readers implement [`SheetSource`] and share the same header rules (see
//! [`sheet_from_grid`]):
//!
//! - [`google`]: Google Sheets API v4 with service-account credentials
//! - [`csv`]: a CSV export of the worksheet
//!
//! A [`RawSheet`] is itself a source that returns a copy of itself, which is handy for tests and
//! for callers that already hold the data.

pub mod csv;
pub mod google;

use std::collections::HashSet;

use crate::columns::DEFAULT_WORKSHEET;
use crate::error::{SyncError, SyncResult};
use crate::types::RawSheet;

pub use self::csv::CsvSheetSource;
pub use google::{GoogleCredentials, GoogleSheetsSource, ServiceAccountKey};

/// Which document and worksheet to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLocator {
    /// Document URL or id (meaning depends on the source: Sheets URL/id, export path, ...).
    pub document: String,
    /// Worksheet (tab) name.
    pub worksheet: String,
}

impl SheetLocator {
    pub fn new(document: impl Into<String>, worksheet: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            worksheet: worksheet.into(),
        }
    }

    /// Locator for the default `Clean_data` worksheet of `document`.
    pub fn clean_data(document: impl Into<String>) -> Self {
        Self::new(document, DEFAULT_WORKSHEET)
    }
}

/// Reads a worksheet.
pub trait SheetSource {
    /// Fetch the worksheet's header and data rows.
    fn read(&self, locator: &SheetLocator) -> SyncResult<RawSheet>;
}

impl SheetSource for RawSheet {
    fn read(&self, _locator: &SheetLocator) -> SyncResult<RawSheet> {
        Ok(self.clone())
    }
}

impl<S: SheetSource + ?Sized> SheetSource for Box<S> {
    fn read(&self, locator: &SheetLocator) -> SyncResult<RawSheet> {
        (**self).read(locator)
    }
}

/// Build a [`RawSheet`] from a grid whose first row is the header.
///
/// Header cells are trimmed. Columns with an empty header are dropped, a repeated header name is
/// an [`SyncError::InvalidHeader`]. An empty grid yields an empty sheet.
pub fn sheet_from_grid(grid: Vec<Vec<String>>) -> SyncResult<RawSheet> {
    let mut rows = grid.into_iter();
    let Some(header_row) = rows.next() else {
        return Ok(RawSheet::default());
    };

    let mut keep: Vec<usize> = Vec::with_capacity(header_row.len());
    let mut headers: Vec<String> = Vec::with_capacity(header_row.len());
    let mut seen: HashSet<String> = HashSet::new();
    for (idx, cell) in header_row.iter().enumerate() {
        let name = cell.trim();
        if name.is_empty() {
            continue;
        }
        if !seen.insert(name.to_owned()) {
            return Err(SyncError::InvalidHeader {
                message: format!("duplicate column '{name}' in header row"),
            });
        }
        keep.push(idx);
        headers.push(name.to_owned());
    }

    let data = rows
        .map(|row| {
            keep.iter()
                .map(|&idx| row.get(idx).cloned().unwrap_or_default())
                .collect()
        })
        .collect();

    Ok(RawSheet::new(headers, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn grid_header_is_trimmed_and_unnamed_columns_dropped() {
        let sheet = sheet_from_grid(grid(&[
            &[" member_id ", "", "coach"],
            &["A1", "ignored", "Sam"],
            &["B2"],
        ]))
        .unwrap();

        assert_eq!(sheet.headers, vec!["member_id", "coach"]);
        assert_eq!(sheet.rows[0], vec!["A1", "Sam"]);
        assert_eq!(sheet.rows[1], vec!["B2", ""]);
    }

    #[test]
    fn grid_rejects_duplicate_headers() {
        let err = sheet_from_grid(grid(&[&["member_id", "coach", "coach"]])).unwrap_err();
        assert!(err.to_string().contains("duplicate column 'coach'"));
    }

    #[test]
    fn empty_grid_is_an_empty_sheet() {
        let sheet = sheet_from_grid(Vec::new()).unwrap();
        assert!(sheet.headers.is_empty());
        assert_eq!(sheet.row_count(), 0);
    }
}
