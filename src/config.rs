//! Run configuration from environment variables.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `SHEET_URL` | spreadsheet URL or id | required unless `SHEET_CSV_EXPORT` is set |
//! | `SHEET_WORKSHEET` | worksheet name | `Clean_data` |
//! | `SHEET_CSV_EXPORT` | read a CSV export (file or directory) instead of the Sheets API | |
//! | `GOOGLE_CREDENTIALS` | inline service-account JSON | |
//! | `GOOGLE_APPLICATION_CREDENTIALS` | path to a service-account JSON file | |
//! | `GOOGLE_ACCESS_TOKEN` | pre-issued OAuth access token | |
//! | `DATABASE_URL` | PostgreSQL connection URL | required to load |
//! | `SYNC_TABLE` | destination table | `healthcare_data` |
//! | `SYNC_PAGE_SIZE` | rows per `INSERT` | `100` |
//! | `SYNC_SCHEMA_POLICY` | `strict` or `lenient` | `strict` |
//! | `SYNC_HTTP_TIMEOUT_SECS` | Sheets API timeout | `30` |
//! | `SYNC_CONNECT_TIMEOUT_SECS` | database connect timeout | `10` |
//! | `SYNC_STATEMENT_TIMEOUT_SECS` | database statement timeout | none |
//! | `SYNC_CREATE_TABLE` | create the table if it does not exist | `false` |
//!
//! Credentials are resolved in the order listed above; the first one set wins.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cleaning::SchemaPolicy;
use crate::columns::{DEFAULT_TABLE, DEFAULT_WORKSHEET, TableSpec};
use crate::error::{SyncError, SyncResult};
use crate::load::postgres::DEFAULT_CONNECT_TIMEOUT;
use crate::load::{DEFAULT_PAGE_SIZE, LoaderOptions, PostgresStore};
use crate::pipeline::PipelineOptions;
use crate::source::google::DEFAULT_HTTP_TIMEOUT;
use crate::source::{
    CsvSheetSource, GoogleCredentials, GoogleSheetsSource, ServiceAccountKey, SheetLocator,
    SheetSource,
};

pub const SHEET_URL: &str = "SHEET_URL";
pub const SHEET_WORKSHEET: &str = "SHEET_WORKSHEET";
pub const SHEET_CSV_EXPORT: &str = "SHEET_CSV_EXPORT";
pub const GOOGLE_CREDENTIALS: &str = "GOOGLE_CREDENTIALS";
pub const GOOGLE_APPLICATION_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const GOOGLE_ACCESS_TOKEN: &str = "GOOGLE_ACCESS_TOKEN";
pub const DATABASE_URL: &str = "DATABASE_URL";
pub const SYNC_TABLE: &str = "SYNC_TABLE";
pub const SYNC_PAGE_SIZE: &str = "SYNC_PAGE_SIZE";
pub const SYNC_SCHEMA_POLICY: &str = "SYNC_SCHEMA_POLICY";
pub const SYNC_HTTP_TIMEOUT_SECS: &str = "SYNC_HTTP_TIMEOUT_SECS";
pub const SYNC_CONNECT_TIMEOUT_SECS: &str = "SYNC_CONNECT_TIMEOUT_SECS";
pub const SYNC_STATEMENT_TIMEOUT_SECS: &str = "SYNC_STATEMENT_TIMEOUT_SECS";
pub const SYNC_CREATE_TABLE: &str = "SYNC_CREATE_TABLE";

/// Where Sheets API credentials come from.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Service-account JSON payload.
    Inline(String),
    /// Path to a service-account JSON file.
    File(PathBuf),
    AccessToken(String),
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(_) => f.write_str("Inline(..)"),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::AccessToken(_) => f.write_str("AccessToken(..)"),
        }
    }
}

impl CredentialSource {
    pub fn resolve(&self) -> SyncResult<GoogleCredentials> {
        match self {
            Self::Inline(json) => Ok(GoogleCredentials::ServiceAccount(
                ServiceAccountKey::from_json(json)?,
            )),
            Self::File(path) => Ok(GoogleCredentials::ServiceAccount(
                ServiceAccountKey::from_file(path)?,
            )),
            Self::AccessToken(token) => Ok(GoogleCredentials::AccessToken(token.clone())),
        }
    }
}

/// Everything needed to build a [`crate::pipeline::SyncPipeline`].
#[derive(Clone)]
pub struct SyncConfig {
    pub locator: SheetLocator,
    pub csv_export: Option<PathBuf>,
    pub credentials: Option<CredentialSource>,
    pub http_timeout: Duration,
    pub database_url: Option<String>,
    pub table: String,
    pub page_size: usize,
    pub schema_policy: SchemaPolicy,
    pub connect_timeout: Duration,
    pub statement_timeout: Option<Duration>,
    pub create_table: bool,
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("locator", &self.locator)
            .field("csv_export", &self.csv_export)
            .field("credentials", &self.credentials)
            .field("http_timeout", &self.http_timeout)
            .field("database_url_set", &self.database_url.is_some())
            .field("table", &self.table)
            .field("page_size", &self.page_size)
            .field("schema_policy", &self.schema_policy)
            .field("connect_timeout", &self.connect_timeout)
            .field("statement_timeout", &self.statement_timeout)
            .field("create_table", &self.create_table)
            .finish()
    }
}

impl SyncConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> SyncResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup` (variable name to value). Empty values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let csv_export = get(SHEET_CSV_EXPORT).map(PathBuf::from);
        let document = match (get(SHEET_URL), &csv_export) {
            (Some(url), _) => url,
            (None, Some(_)) => String::new(),
            (None, None) => {
                return Err(SyncError::config(format!(
                    "{SHEET_URL} is not set (or set {SHEET_CSV_EXPORT} to read an export)"
                )));
            }
        };
        let worksheet = get(SHEET_WORKSHEET).unwrap_or_else(|| DEFAULT_WORKSHEET.to_string());

        let credentials = get(GOOGLE_CREDENTIALS)
            .map(CredentialSource::Inline)
            .or_else(|| {
                get(GOOGLE_APPLICATION_CREDENTIALS).map(|p| CredentialSource::File(p.into()))
            })
            .or_else(|| get(GOOGLE_ACCESS_TOKEN).map(CredentialSource::AccessToken));

        let schema_policy = match get(SYNC_SCHEMA_POLICY) {
            Some(v) => v.parse()?,
            None => SchemaPolicy::default(),
        };

        Ok(Self {
            locator: SheetLocator::new(document, worksheet),
            csv_export,
            credentials,
            http_timeout: parse_var(SYNC_HTTP_TIMEOUT_SECS, get(SYNC_HTTP_TIMEOUT_SECS))?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT),
            database_url: get(DATABASE_URL),
            table: get(SYNC_TABLE).unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            page_size: parse_var(SYNC_PAGE_SIZE, get(SYNC_PAGE_SIZE))?.unwrap_or(DEFAULT_PAGE_SIZE),
            schema_policy,
            connect_timeout: parse_var(SYNC_CONNECT_TIMEOUT_SECS, get(SYNC_CONNECT_TIMEOUT_SECS))?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            statement_timeout: parse_var(
                SYNC_STATEMENT_TIMEOUT_SECS,
                get(SYNC_STATEMENT_TIMEOUT_SECS),
            )?
            .map(Duration::from_secs),
            create_table: get(SYNC_CREATE_TABLE)
                .map(|v| parse_bool(SYNC_CREATE_TABLE, &v))
                .transpose()?
                .unwrap_or(false),
        })
    }

    pub fn table_spec(&self) -> TableSpec {
        TableSpec::healthcare().with_table_name(self.table.clone())
    }

    /// Pipeline options without an observer.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            locator: self.locator.clone(),
            table: self.table_spec(),
            loader: LoaderOptions {
                page_size: self.page_size,
            },
            schema_policy: self.schema_policy,
            ..Default::default()
        }
    }

    /// The CSV export reader when one is configured, the Sheets API reader otherwise.
    pub fn sheet_source(&self) -> SyncResult<Box<dyn SheetSource>> {
        if let Some(path) = &self.csv_export {
            return Ok(Box::new(CsvSheetSource::new(path)));
        }
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            SyncError::authentication(format!(
                "no credentials: set {GOOGLE_CREDENTIALS}, {GOOGLE_APPLICATION_CREDENTIALS} \
                 or {GOOGLE_ACCESS_TOKEN}"
            ))
        })?;
        Ok(Box::new(GoogleSheetsSource::with_timeout(
            credentials.resolve()?,
            self.http_timeout,
        )))
    }

    pub fn postgres_store(&self) -> SyncResult<PostgresStore> {
        let url = self
            .database_url
            .as_deref()
            .ok_or_else(|| SyncError::config(format!("{DATABASE_URL} is not set")))?;
        let mut store = PostgresStore::from_url(url)?.with_connect_timeout(self.connect_timeout);
        if let Some(timeout) = self.statement_timeout {
            store = store.with_statement_timeout(timeout);
        }
        if self.create_table {
            store = store.with_create_table(self.table_spec());
        }
        Ok(store)
    }
}

fn parse_var<T: FromStr>(key: &str, value: Option<String>) -> SyncResult<Option<T>> {
    value
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| SyncError::config(format!("{key}: cannot parse '{v}'")))
        })
        .transpose()
}

fn parse_bool(key: &str, value: &str) -> SyncResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SyncError::config(format!("{key}: expected a boolean, got '{value}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_the_sheet_is_set() {
        let cfg = SyncConfig::from_lookup(lookup(&[(SHEET_URL, "abc123")])).unwrap();
        assert_eq!(cfg.locator, SheetLocator::new("abc123", "Clean_data"));
        assert_eq!(cfg.table, "healthcare_data");
        assert_eq!(cfg.page_size, 100);
        assert_eq!(cfg.schema_policy, SchemaPolicy::Strict);
        assert_eq!(cfg.http_timeout, Duration::from_secs(30));
        assert_eq!(cfg.statement_timeout, None);
        assert!(cfg.credentials.is_none());
        assert!(!cfg.create_table);
    }

    #[test]
    fn inline_credentials_take_precedence() {
        let cfg = SyncConfig::from_lookup(lookup(&[
            (SHEET_URL, "abc123"),
            (GOOGLE_CREDENTIALS, "{}"),
            (GOOGLE_APPLICATION_CREDENTIALS, "/keys/sa.json"),
        ]))
        .unwrap();
        assert_eq!(cfg.credentials, Some(CredentialSource::Inline("{}".into())));
    }

    #[test]
    fn missing_sheet_is_a_config_error() {
        let err =
            SyncConfig::from_lookup(lookup(&[(DATABASE_URL, "postgres://x@y/z")])).unwrap_err();
        assert!(matches!(err, SyncError::Config { .. }));
    }

    #[test]
    fn bad_numbers_and_policies_are_rejected() {
        let err = SyncConfig::from_lookup(lookup(&[(SHEET_URL, "a"), (SYNC_PAGE_SIZE, "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains(SYNC_PAGE_SIZE));

        let err =
            SyncConfig::from_lookup(lookup(&[(SHEET_URL, "a"), (SYNC_SCHEMA_POLICY, "loose")]))
                .unwrap_err();
        assert!(matches!(err, SyncError::Config { .. }));
    }

    #[test]
    fn sheet_source_without_credentials_fails_authentication() {
        let cfg = SyncConfig::from_lookup(lookup(&[(SHEET_URL, "abc123")])).unwrap();
        assert!(matches!(
            cfg.sheet_source().err(),
            Some(SyncError::Authentication { .. })
        ));
    }

    #[test]
    fn store_requires_database_url() {
        let cfg = SyncConfig::from_lookup(lookup(&[(SHEET_URL, "abc123")])).unwrap();
        assert!(matches!(cfg.postgres_store().unwrap_err(), SyncError::Config { .. }));

        let cfg = SyncConfig::from_lookup(lookup(&[
            (SHEET_URL, "abc123"),
            (DATABASE_URL, "postgres://sync@localhost/coaching"),
            (SYNC_TABLE, "staging_healthcare"),
            (SYNC_CREATE_TABLE, "yes"),
        ]))
        .unwrap();
        assert!(cfg.postgres_store().is_ok());
        assert_eq!(cfg.pipeline_options().table.name, "staging_healthcare");
    }
}
