//! Destination column catalogue.
//!
//! The 17 columns of the `healthcare_data` table, in insert order, each tagged with the cleaning
//! class the [`crate::cleaning`] stage applies and the SQL type the loader binds.

use crate::types::DataType;

/// Default destination table.
pub const DEFAULT_TABLE: &str = "healthcare_data";

/// Default worksheet holding the cleaned metrics.
pub const DEFAULT_WORKSHEET: &str = "Clean_data";

/// Conflict/idempotency key column.
pub const KEY_COLUMN: &str = "member_id";

/// How the cleaner normalizes a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnClass {
    /// Passed through as text.
    Text,
    /// Decimal number, bound as an integer (fractions rounded at load).
    Integer,
    /// Decimal number.
    Numeric,
    /// Decimal number with an optional trailing `%`.
    Percentage,
    /// Calendar date or date/time.
    Date,
}

impl ColumnClass {
    /// Logical type of cleaned values in this class.
    pub fn data_type(self) -> DataType {
        match self {
            ColumnClass::Text => DataType::Utf8,
            ColumnClass::Integer => DataType::Int64,
            // fractional values in integer columns stay Float64 until bound
            ColumnClass::Numeric | ColumnClass::Percentage => DataType::Float64,
            ColumnClass::Date => DataType::Timestamp,
        }
    }
}

/// SQL type a column is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    BigInt,
    DoublePrecision,
    Timestamp,
}

impl SqlType {
    pub fn as_sql(self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::BigInt => "BIGINT",
            SqlType::DoublePrecision => "DOUBLE PRECISION",
            SqlType::Timestamp => "TIMESTAMP",
        }
    }

    fn for_class(class: ColumnClass) -> Self {
        match class {
            ColumnClass::Text => SqlType::Text,
            ColumnClass::Integer => SqlType::BigInt,
            ColumnClass::Numeric | ColumnClass::Percentage => SqlType::DoublePrecision,
            ColumnClass::Date => SqlType::Timestamp,
        }
    }
}

/// A destination column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub class: ColumnClass,
    pub sql_type: SqlType,
    /// Live column type the bound value is cast to, when it is not one of [`SqlType`]
    /// (an enum, `uuid`, a domain).
    pub cast: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, class: ColumnClass) -> Self {
        Self {
            name: name.into(),
            class,
            sql_type: SqlType::for_class(class),
            cast: None,
        }
    }
}

const HEALTHCARE_COLUMNS: [(&str, ColumnClass); 17] = [
    ("member_id", ColumnClass::Text),
    ("gender", ColumnClass::Text),
    ("days", ColumnClass::Integer),
    ("coach", ColumnClass::Text),
    ("meallog_1d_pct", ColumnClass::Percentage),
    ("days_no_chat", ColumnClass::Integer),
    ("last_chat_sent_date", ColumnClass::Date),
    ("meal_log_7d_pct", ColumnClass::Percentage),
    ("gfy_7d_pct", ColumnClass::Percentage),
    ("last_meal_log_date", ColumnClass::Date),
    ("start_hba1c", ColumnClass::Numeric),
    ("last_hba1c", ColumnClass::Numeric),
    ("weight_change", ColumnClass::Numeric),
    ("weight_status", ColumnClass::Text),
    ("hba1c_status", ColumnClass::Text),
    ("meal_logging_level", ColumnClass::Text),
    ("gfy_level", ColumnClass::Text),
];

/// Names of the percentage-class columns.
pub fn percentage_columns() -> impl Iterator<Item = &'static str> {
    columns_of(ColumnClass::Percentage)
}

/// Names of the numeric columns (integer and decimal).
pub fn numeric_columns() -> impl Iterator<Item = &'static str> {
    HEALTHCARE_COLUMNS
        .iter()
        .filter(|(_, c)| matches!(c, ColumnClass::Integer | ColumnClass::Numeric))
        .map(|(n, _)| *n)
}

/// Names of the date-class columns.
pub fn date_columns() -> impl Iterator<Item = &'static str> {
    columns_of(ColumnClass::Date)
}

fn columns_of(class: ColumnClass) -> impl Iterator<Item = &'static str> {
    HEALTHCARE_COLUMNS
        .iter()
        .filter(move |(_, c)| *c == class)
        .map(|(n, _)| *n)
}

/// Cleaning class of a column name, or `None` for columns outside the catalogue.
pub fn class_of(name: &str) -> Option<ColumnClass> {
    HEALTHCARE_COLUMNS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, c)| *c)
}

/// Destination table: name, conflict key and ordered columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub key: String,
    pub columns: Vec<Column>,
}

impl Default for TableSpec {
    fn default() -> Self {
        Self::healthcare()
    }
}

impl TableSpec {
    /// The `healthcare_data` table.
    pub fn healthcare() -> Self {
        Self {
            name: DEFAULT_TABLE.to_string(),
            key: KEY_COLUMN.to_string(),
            columns: HEALTHCARE_COLUMNS
                .iter()
                .map(|(name, class)| Column::new(*name, *class))
                .collect(),
        }
    }

    /// Same columns, different (optionally schema-qualified) table name.
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override the SQL type a column is bound as (e.g. an integer `member_id`), with no further
    /// cast.
    pub fn with_column_type(mut self, column: &str, sql_type: SqlType) -> Self {
        if let Some(c) = self.columns.iter_mut().find(|c| c.name == column) {
            c.sql_type = sql_type;
            c.cast = None;
        }
        self
    }

    /// Bind `column` as `sql_type` and cast it to the SQL type `cast` inside the statement.
    pub fn with_column_cast(
        mut self,
        column: &str,
        sql_type: SqlType,
        cast: impl Into<String>,
    ) -> Self {
        if let Some(c) = self.columns.iter_mut().find(|c| c.name == column) {
            c.sql_type = sql_type;
            c.cast = Some(cast.into());
        }
        self
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Position of the conflict key within [`Self::columns`].
    pub fn key_index(&self) -> Option<usize> {
        self.columns.iter().position(|c| c.name == self.key)
    }

    /// Table name quoted for SQL; `schema.table` quotes each part.
    pub fn quoted_name(&self) -> String {
        self.name
            .split('.')
            .map(quote_ident)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// `CREATE TABLE IF NOT EXISTS` statement with a unique conflict key.
    pub fn create_table_sql(&self) -> String {
        let cols: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let ty = c.cast.as_deref().unwrap_or(c.sql_type.as_sql());
                let mut def = format!("{} {}", quote_ident(&c.name), ty);
                if c.name == self.key {
                    def.push_str(" PRIMARY KEY");
                }
                def
            })
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.quoted_name(),
            cols.join(", ")
        )
    }
}

/// Double-quote an SQL identifier.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_classifies_every_destination_column() {
        let spec = TableSpec::healthcare();
        assert_eq!(spec.columns.len(), 17);
        assert_eq!(spec.key_index(), Some(0));
        assert_eq!(percentage_columns().count(), 3);
        assert_eq!(numeric_columns().count(), 5);
        assert_eq!(date_columns().count(), 2);
        assert_eq!(class_of("days"), Some(ColumnClass::Integer));
        assert_eq!(class_of("coach"), Some(ColumnClass::Text));
        assert_eq!(class_of("not_a_column"), None);
    }

    #[test]
    fn create_table_sql_quotes_schema_qualified_names() {
        let spec = TableSpec::healthcare().with_table_name("coaching.healthcare_data");
        let ddl = spec.create_table_sql();
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS \"coaching\".\"healthcare_data\" ("));
        assert!(ddl.contains("\"member_id\" TEXT PRIMARY KEY"));
        assert!(ddl.contains("\"last_meal_log_date\" TIMESTAMP"));
        assert!(ddl.contains("\"gfy_7d_pct\" DOUBLE PRECISION"));
    }

    #[test]
    fn column_type_override_changes_binding_only() {
        let spec = TableSpec::healthcare().with_column_type("member_id", SqlType::BigInt);
        assert_eq!(spec.columns[0].sql_type, SqlType::BigInt);
        assert_eq!(spec.columns[0].class, ColumnClass::Text);
    }

    #[test]
    fn column_cast_is_used_for_the_table_definition() {
        let spec = TableSpec::healthcare().with_column_cast("gender", SqlType::Text, "gender_t");
        assert_eq!(spec.columns[1].cast.as_deref(), Some("gender_t"));
        assert!(spec.create_table_sql().contains("\"gender\" gender_t,"));
    }
}
