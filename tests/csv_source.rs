use std::io::Write;

use coaching_sheet_sync::SyncError;
use coaching_sheet_sync::source::csv::read_csv_from_reader;
use coaching_sheet_sync::source::{CsvSheetSource, SheetLocator, SheetSource};

fn fixture_locator() -> SheetLocator {
    SheetLocator::new("", "clean_data")
}

#[test]
fn reads_export_file_with_header_and_rows() {
    let sheet = CsvSheetSource::new("tests/fixtures/clean_data.csv")
        .read(&fixture_locator())
        .unwrap();

    assert_eq!(sheet.headers.len(), 17);
    assert_eq!(sheet.headers[0], "member_id");
    assert_eq!(sheet.headers[16], "gfy_level");
    // The fully blank line is dropped.
    assert_eq!(sheet.row_count(), 4);
    assert_eq!(sheet.cell(1, "meallog_1d_pct"), Some(" 12.5 % "));
    assert_eq!(sheet.cell(3, "member_id"), Some(""));
}

#[test]
fn directory_resolves_worksheet_file() {
    let sheet = CsvSheetSource::new("tests/fixtures")
        .read(&fixture_locator())
        .unwrap();
    assert_eq!(sheet.cell(0, "member_id"), Some("A1"));
}

#[test]
fn missing_export_is_source_unavailable() {
    let err = CsvSheetSource::new("tests/fixtures")
        .read(&SheetLocator::new("", "Does_not_exist"))
        .unwrap_err();
    assert!(matches!(err, SyncError::SourceUnavailable { .. }));
}

#[test]
fn duplicate_header_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "member_id,days,member_id").unwrap();
    writeln!(file, "A1,3,A1").unwrap();
    file.flush().unwrap();

    let err = CsvSheetSource::new(file.path())
        .read(&fixture_locator())
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidHeader { .. }), "{err}");
}

#[test]
fn short_rows_are_padded_and_blank_headers_ignored() {
    let data = "member_id, ,days\nA1,x\nB2,y,4,extra\n";
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data.as_bytes());

    let sheet = read_csv_from_reader(&mut rdr).unwrap();
    assert_eq!(sheet.headers, vec!["member_id".to_string(), "days".to_string()]);
    assert_eq!(sheet.rows[0], vec!["A1".to_string(), String::new()]);
    assert_eq!(sheet.rows[1], vec!["B2".to_string(), "4".to_string()]);
}

#[test]
fn header_only_export_has_no_rows() {
    let data = "member_id,days\n";
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data.as_bytes());

    let sheet = read_csv_from_reader(&mut rdr).unwrap();
    assert_eq!(sheet.headers.len(), 2);
    assert_eq!(sheet.row_count(), 0);
}
