use chrono::NaiveDate;
use coaching_sheet_sync::SyncError;
use coaching_sheet_sync::cleaning::{SchemaPolicy, clean_sheet, clean_value, validate_headers};
use coaching_sheet_sync::columns::{ColumnClass, TableSpec};
use coaching_sheet_sync::types::{RawSheet, Value};

fn midnight(y: i32, m: u32, d: u32) -> Value {
    Value::Timestamp(NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap())
}

#[test]
fn percentages_drop_the_sign_and_whitespace() {
    assert_eq!(clean_value(ColumnClass::Percentage, "87%"), Value::Float64(87.0));
    assert_eq!(clean_value(ColumnClass::Percentage, " 12.5 % "), Value::Float64(12.5));
    assert_eq!(clean_value(ColumnClass::Percentage, "40"), Value::Float64(40.0));
    assert_eq!(clean_value(ColumnClass::Percentage, "n/a"), Value::Null);
    assert_eq!(clean_value(ColumnClass::Percentage, "%"), Value::Null);
}

#[test]
fn numerics_parse_or_null() {
    assert_eq!(clean_value(ColumnClass::Numeric, "7.1"), Value::Float64(7.1));
    assert_eq!(clean_value(ColumnClass::Numeric, "-2.5"), Value::Float64(-2.5));
    assert_eq!(clean_value(ColumnClass::Numeric, "abc"), Value::Null);
    assert_eq!(clean_value(ColumnClass::Numeric, "NaN"), Value::Null);
    assert_eq!(clean_value(ColumnClass::Integer, "14"), Value::Int64(14));
    assert_eq!(clean_value(ColumnClass::Integer, "14.0"), Value::Int64(14));
    assert_eq!(clean_value(ColumnClass::Integer, "14.5"), Value::Float64(14.5));
    assert_eq!(clean_value(ColumnClass::Integer, " 3.5 "), Value::Float64(3.5));
    assert_eq!(clean_value(ColumnClass::Integer, "three"), Value::Null);
}

#[test]
fn dates_parse_to_midnight_or_null() {
    assert_eq!(clean_value(ColumnClass::Date, "2023-05-01"), midnight(2023, 5, 1));
    assert_eq!(clean_value(ColumnClass::Date, "05/01/2023"), midnight(2023, 5, 1));
    assert_eq!(clean_value(ColumnClass::Date, "01-May-2023"), midnight(2023, 5, 1));
    assert_eq!(clean_value(ColumnClass::Date, ""), Value::Null);
    assert_eq!(clean_value(ColumnClass::Date, "yesterday"), Value::Null);
}

#[test]
fn text_is_trimmed_and_blank_text_is_null() {
    assert_eq!(clean_value(ColumnClass::Text, "  Sam "), Value::Utf8("Sam".into()));
    assert_eq!(clean_value(ColumnClass::Text, "   "), Value::Null);
}

#[test]
fn cleaning_keeps_row_order_and_count() {
    let sheet = RawSheet::new(
        vec!["member_id".into(), "days".into(), "notes".into()],
        vec![
            vec!["C3".into(), "x".into(), "87%".into()],
            vec!["A1".into(), "3".into(), "".into()],
            vec!["B2".into(), "".into(), "ok".into()],
        ],
    );

    let (ds, report) = clean_sheet(&sheet);
    assert_eq!(ds.row_count(), 3);
    let keys: Vec<&str> = (0..3)
        .map(|r| ds.value(r, "member_id").and_then(Value::as_str).unwrap())
        .collect();
    assert_eq!(keys, vec!["C3", "A1", "B2"]);

    // Unclassified columns pass through untouched.
    assert_eq!(ds.value(0, "notes"), Some(&Value::Utf8("87%".into())));
    // Only non-empty values that failed to parse are counted.
    assert_eq!(report.nulled.get("days"), Some(&1));
    assert_eq!(report.total_nulled(), 1);
}

#[test]
fn strict_header_check_lists_missing_columns() {
    let sheet = RawSheet::new(vec!["member_id".into(), "coach".into()], Vec::new());
    let err = validate_headers(&sheet, &TableSpec::healthcare(), SchemaPolicy::Strict).unwrap_err();

    match err {
        SyncError::MissingColumns { missing } => {
            assert_eq!(missing.len(), 15);
            assert_eq!(missing[0], "gender");
            assert!(!missing.contains(&"coach".to_string()));
        }
        other => panic!("expected MissingColumns, got {other:?}"),
    }
}

#[test]
fn lenient_header_check_reports_but_tolerates() {
    let sheet = RawSheet::new(vec!["member_id".into(), "coach".into()], Vec::new());
    let missing =
        validate_headers(&sheet, &TableSpec::healthcare(), SchemaPolicy::Lenient).unwrap();
    assert_eq!(missing.len(), 15);
}

#[test]
fn schema_policy_parses_from_text() {
    assert_eq!("Lenient".parse::<SchemaPolicy>().unwrap(), SchemaPolicy::Lenient);
    assert_eq!(" strict ".parse::<SchemaPolicy>().unwrap(), SchemaPolicy::Strict);
    assert!("loose".parse::<SchemaPolicy>().is_err());
}
