//! CSV export reader.

use std::path::{Path, PathBuf};

use crate::error::{SyncError, SyncResult};
use crate::types::RawSheet;

use super::{SheetLocator, SheetSource, sheet_from_grid};

/// Reads a worksheet from a CSV export (`File > Download > CSV`).
///
/// If `path` is a directory, the worksheet is read from `<path>/<worksheet>.csv`; otherwise
/// `path` is the export file itself and the locator's worksheet is ignored.
#[derive(Debug, Clone)]
pub struct CsvSheetSource {
    path: PathBuf,
}

impl CsvSheetSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn resolve(&self, locator: &SheetLocator) -> PathBuf {
        if self.path.is_dir() {
            self.path.join(format!("{}.csv", locator.worksheet))
        } else {
            self.path.clone()
        }
    }
}

impl SheetSource for CsvSheetSource {
    fn read(&self, locator: &SheetLocator) -> SyncResult<RawSheet> {
        let path = self.resolve(locator);
        if !path.is_file() {
            return Err(SyncError::source_unavailable(format!(
                "worksheet '{}' export not found at {}",
                locator.worksheet,
                path.display()
            )));
        }
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)?;
        read_csv_from_reader(&mut rdr)
    }
}

/// Read a worksheet from an existing CSV reader.
///
/// The reader must be built with `has_headers(false)`: the first record is taken as the header
/// row. Rows may have differing lengths when the reader is `flexible`.
pub fn read_csv_from_reader<R: std::io::Read>(rdr: &mut csv::Reader<R>) -> SyncResult<RawSheet> {
    let mut grid: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        grid.push(record.iter().map(str::to_owned).collect());
    }
    sheet_from_grid(grid)
}
