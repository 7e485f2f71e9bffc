//! Cleaning: raw worksheet text into typed records.
//!
//! [`clean_sheet`] turns a [`RawSheet`] into a [`DataSet`] of the same length and order:
//!
//! - percentage columns: trailing `%` and whitespace stripped, then parsed as a decimal
//! - numeric columns: parsed as a decimal (`days`/`days_no_chat` must be integral)
//! - date columns: parsed as a calendar date/time
//! - every other column passes through as text
//!
//! A value that fails to parse becomes [`Value::Null`] and is counted in the
//! [`CleaningReport`]. A catalogue column missing from the sheet is simply skipped; use
//! [`validate_headers`] beforehand to decide whether that should fail the run.
//!
//! ```rust
//! use coaching_sheet_sync::cleaning::clean_sheet;
//! use coaching_sheet_sync::types::{RawSheet, Value};
//!
//! let sheet = RawSheet::new(
//!     vec!["member_id".into(), "meallog_1d_pct".into(), "start_hba1c".into()],
//!     vec![vec!["A1".into(), " 12.5 % ".into(), "abc".into()]],
//! );
//! let (ds, report) = clean_sheet(&sheet);
//! assert_eq!(ds.value(0, "meallog_1d_pct"), Some(&Value::Float64(12.5)));
//! assert_eq!(ds.value(0, "start_hba1c"), Some(&Value::Null));
//! assert_eq!(report.total_nulled(), 1);
//! ```

pub mod parse;

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::columns::{ColumnClass, TableSpec, class_of};
use crate::error::{SyncError, SyncResult};
use crate::types::{DataSet, Field, RawSheet, Schema, Value};

/// How strictly the worksheet header is checked against the destination columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaPolicy {
    /// Every destination column must be present in the header.
    #[default]
    Strict,
    /// Missing columns are tolerated and loaded as null; only the key column is required.
    Lenient,
}

impl FromStr for SchemaPolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(SchemaPolicy::Strict),
            "lenient" => Ok(SchemaPolicy::Lenient),
            other => Err(SyncError::config(format!(
                "unknown schema policy '{other}' (expected 'strict' or 'lenient')"
            ))),
        }
    }
}

/// Values coerced to null because they did not parse, per column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleaningReport {
    pub nulled: BTreeMap<String, usize>,
}

impl CleaningReport {
    pub fn total_nulled(&self) -> usize {
        self.nulled.values().sum()
    }
}

/// Check the sheet header against `table`.
///
/// Returns the destination columns absent from the sheet (always empty under
/// [`SchemaPolicy::Strict`], which fails instead).
pub fn validate_headers(
    sheet: &RawSheet,
    table: &TableSpec,
    policy: SchemaPolicy,
) -> SyncResult<Vec<String>> {
    let missing: Vec<String> = table
        .column_names()
        .filter(|name| sheet.index_of(name).is_none())
        .map(str::to_owned)
        .collect();

    if missing.is_empty() {
        return Ok(missing);
    }

    let key_missing = missing.iter().any(|m| *m == table.key);
    match policy {
        SchemaPolicy::Strict => Err(SyncError::MissingColumns { missing }),
        SchemaPolicy::Lenient if key_missing => Err(SyncError::MissingColumns {
            missing: vec![table.key.clone()],
        }),
        SchemaPolicy::Lenient => Ok(missing),
    }
}

/// Clean every row of `sheet`.
pub fn clean_sheet(sheet: &RawSheet) -> (DataSet, CleaningReport) {
    let classes: Vec<ColumnClass> = sheet
        .headers
        .iter()
        .map(|h| class_of(h).unwrap_or(ColumnClass::Text))
        .collect();

    let schema = Schema::new(
        sheet
            .headers
            .iter()
            .zip(classes.iter())
            .map(|(h, c)| Field::new(h.clone(), c.data_type()))
            .collect(),
    );

    let mut report = CleaningReport::default();
    let rows = sheet
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .zip(classes.iter())
                .zip(sheet.headers.iter())
                .map(|((raw, class), header)| {
                    let value = clean_value(*class, raw);
                    if value.is_null() && *class != ColumnClass::Text && !raw.trim().is_empty() {
                        *report.nulled.entry(header.clone()).or_default() += 1;
                    }
                    value
                })
                .collect()
        })
        .collect();

    (DataSet::new(schema, rows), report)
}

/// Clean a single raw value according to its column class.
pub fn clean_value(class: ColumnClass, raw: &str) -> Value {
    let parsed = match class {
        ColumnClass::Text => {
            let trimmed = raw.trim();
            (!trimmed.is_empty()).then(|| Value::Utf8(trimmed.to_owned()))
        }
        ColumnClass::Integer => parse::parse_decimal(raw).map(|v| match parse::as_integer(v) {
            Some(i) => Value::Int64(i),
            None => Value::Float64(v),
        }),
        ColumnClass::Numeric => parse::parse_decimal(raw).map(Value::Float64),
        ColumnClass::Percentage => parse::parse_percentage(raw).map(Value::Float64),
        ColumnClass::Date => parse::parse_datetime(raw).map(Value::Timestamp),
    };
    parsed.unwrap_or(Value::Null)
}
