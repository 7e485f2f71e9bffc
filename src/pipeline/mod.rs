//! Orchestration: one sync run from worksheet to committed table.
//!
//! [`SyncPipeline::run`] drives the stages in order and never returns an error; every failure is
//! folded into [`SyncOutcome::Failure`] at this boundary.
//!
//! ```text
//! Start -> Reading -> Cleaning -> Loading -> Committed
//!            \___________\___________\______> Failed
//! ```
//!
//! - `Reading`: [`SheetSource::read`]
//! - `Cleaning`: [`validate_headers`] then [`clean_sheet`]
//! - `Loading`: [`Store::connect`], [`BatchLoader::load`], commit
//!
//! The store connection is opened just before loading and dropped before `run` returns, whatever
//! the outcome. An uncommitted transaction is abandoned with it.
//!
//! When an observer is configured, the run reports each stage change, non-fatal warnings,
//! `on_success` with [`SyncStats`], `on_failure` with a computed [`Severity`], and `on_alert` when
//! that severity is `>= options.alert_at_or_above`.

pub mod observability;

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::cleaning::{SchemaPolicy, clean_sheet, validate_headers};
use crate::columns::TableSpec;
use crate::error::{SyncError, SyncResult};
use crate::load::{BatchLoader, LoaderOptions, Store, StoreConnection};
use crate::source::{SheetLocator, SheetSource};

pub use observability::{
    CompositeObserver, FileObserver, Severity, SyncContext, SyncObserver, TracingObserver,
};

/// Where a run is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Start,
    Reading,
    Cleaning,
    Loading,
    Committed,
    Failed,
}

impl RunStage {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStage::Start => "start",
            RunStage::Reading => "reading",
            RunStage::Cleaning => "cleaning",
            RunStage::Loading => "loading",
            RunStage::Committed => "committed",
            RunStage::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts for a committed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Data rows read from the worksheet.
    pub rows_read: usize,
    /// Rows newly inserted.
    pub rows_inserted: usize,
    /// Rows whose key already existed.
    pub rows_skipped_conflict: usize,
    /// Rows without a key.
    pub rows_skipped_missing_key: usize,
    /// Non-empty values that failed to parse and were loaded as null.
    pub values_nulled: usize,
    pub elapsed: Duration,
}

impl fmt::Display for SyncStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "read={} inserted={} already_present={} missing_key={} nulled={} elapsed_ms={}",
            self.rows_read,
            self.rows_inserted,
            self.rows_skipped_conflict,
            self.rows_skipped_missing_key,
            self.values_nulled,
            self.elapsed.as_millis()
        )
    }
}

/// Result of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Success(SyncStats),
    Failure {
        /// Stage that was running when the run failed.
        stage: RunStage,
        severity: Severity,
        message: String,
    },
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Success(_))
    }

    pub fn stats(&self) -> Option<&SyncStats> {
        match self {
            SyncOutcome::Success(stats) => Some(stats),
            SyncOutcome::Failure { .. } => None,
        }
    }

    /// Terminal state of the run.
    pub fn final_stage(&self) -> RunStage {
        match self {
            SyncOutcome::Success(_) => RunStage::Committed,
            SyncOutcome::Failure { .. } => RunStage::Failed,
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Success(stats) => write!(
                f,
                "sync completed: {} rows read, {} inserted, {} already present, \
                 {} without member_id, {} values nulled",
                stats.rows_read,
                stats.rows_inserted,
                stats.rows_skipped_conflict,
                stats.rows_skipped_missing_key,
                stats.values_nulled
            ),
            SyncOutcome::Failure { message, .. } => f.write_str(message),
        }
    }
}

/// Options controlling a run.
///
/// Use [`Default`] for the `Clean_data` worksheet into `healthcare_data`; set `locator.document`.
#[derive(Clone)]
pub struct PipelineOptions {
    pub locator: SheetLocator,
    pub table: TableSpec,
    pub loader: LoaderOptions,
    pub schema_policy: SchemaPolicy,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn SyncObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: Severity,
}

impl fmt::Debug for PipelineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOptions")
            .field("locator", &self.locator)
            .field("table", &self.table.name)
            .field("loader", &self.loader)
            .field("schema_policy", &self.schema_policy)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            locator: SheetLocator::clean_data(""),
            table: TableSpec::healthcare(),
            loader: LoaderOptions::default(),
            schema_policy: SchemaPolicy::default(),
            observer: None,
            alert_at_or_above: Severity::Critical,
        }
    }
}

/// Reads a worksheet, cleans it and loads it into a store.
#[derive(Debug)]
pub struct SyncPipeline<S, D> {
    source: S,
    store: D,
    options: PipelineOptions,
}

impl<S: SheetSource, D: Store> SyncPipeline<S, D> {
    pub fn new(source: S, store: D, options: PipelineOptions) -> Self {
        Self {
            source,
            store,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    /// Execute one run. Never retries.
    pub fn run(&self) -> SyncOutcome {
        let started = Instant::now();
        let ctx = self.context();
        let mut stage = RunStage::Start;
        self.notify_stage(&ctx, stage);

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.execute(&ctx, &mut stage)))
            .unwrap_or_else(|payload| Err(SyncError::load(panic_message(payload.as_ref()))));

        match result {
            Ok(mut stats) => {
                stats.elapsed = started.elapsed();
                self.notify_stage(&ctx, RunStage::Committed);
                if let Some(obs) = &self.options.observer {
                    obs.on_success(&ctx, &stats);
                }
                SyncOutcome::Success(stats)
            }
            Err(e) => {
                let severity = severity_for_error(&e);
                if let Some(obs) = &self.options.observer {
                    obs.on_failure(&ctx, severity, &e);
                    if severity >= self.options.alert_at_or_above {
                        obs.on_alert(&ctx, severity, &e);
                    }
                }
                self.notify_stage(&ctx, RunStage::Failed);
                SyncOutcome::Failure {
                    stage,
                    severity,
                    message: e.to_string(),
                }
            }
        }
    }

    fn execute(&self, ctx: &SyncContext, stage: &mut RunStage) -> SyncResult<SyncStats> {
        self.enter(ctx, stage, RunStage::Reading);
        let sheet = self.source.read(&self.options.locator)?;

        self.enter(ctx, stage, RunStage::Cleaning);
        let missing = validate_headers(&sheet, &self.options.table, self.options.schema_policy)?;
        if !missing.is_empty() {
            self.report_warning(
                ctx,
                &format!("columns missing from sheet, loading as null: {}", missing.join(", ")),
            );
        }
        let (dataset, report) = clean_sheet(&sheet);
        for (column, count) in &report.nulled {
            self.report_warning(
                ctx,
                &format!("{count} unparseable value(s) in '{column}' loaded as null"),
            );
        }

        self.enter(ctx, stage, RunStage::Loading);
        let loader = BatchLoader::new(self.options.table.clone(), self.options.loader.clone());
        let mut conn = self.store.connect()?;
        let load = loader.load(&mut conn, &dataset)?;
        if let Err(e) = conn.commit() {
            if let Err(rollback_err) = conn.rollback() {
                warn!(error = %rollback_err, "rollback after failed commit also failed");
            }
            return Err(e);
        }
        drop(conn);

        if load.skipped_missing_key > 0 {
            self.report_warning(
                ctx,
                &format!(
                    "{} row(s) without '{}' skipped",
                    load.skipped_missing_key, self.options.table.key
                ),
            );
        }

        Ok(SyncStats {
            rows_read: sheet.row_count(),
            rows_inserted: load.inserted,
            rows_skipped_conflict: load.skipped_conflict(),
            rows_skipped_missing_key: load.skipped_missing_key,
            values_nulled: report.total_nulled(),
            elapsed: Duration::ZERO,
        })
    }

    fn context(&self) -> SyncContext {
        SyncContext {
            document: self.options.locator.document.clone(),
            worksheet: self.options.locator.worksheet.clone(),
            table: self.options.table.name.clone(),
        }
    }

    fn enter(&self, ctx: &SyncContext, current: &mut RunStage, next: RunStage) {
        *current = next;
        self.notify_stage(ctx, next);
    }

    fn notify_stage(&self, ctx: &SyncContext, stage: RunStage) {
        if let Some(obs) = &self.options.observer {
            obs.on_stage(ctx, stage);
        }
    }

    fn report_warning(&self, ctx: &SyncContext, message: &str) {
        if let Some(obs) = &self.options.observer {
            obs.on_warning(ctx, message);
        }
    }
}

/// Map an error to the severity reported to observers.
pub fn severity_for_error(e: &SyncError) -> Severity {
    match e {
        SyncError::Authentication { .. } => Severity::Critical,
        SyncError::SourceUnavailable { .. } => Severity::Critical,
        SyncError::Load { .. } => Severity::Critical,
        SyncError::Io(_) => Severity::Critical,
        SyncError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => Severity::Critical,
            _ => Severity::Error,
        },
        SyncError::MissingColumns { .. } => Severity::Error,
        SyncError::InvalidHeader { .. } => Severity::Error,
        SyncError::Config { .. } => Severity::Error,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("unexpected fault: {detail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::MemoryStore;
    use crate::types::RawSheet;

    fn sheet(rows: &[&str]) -> RawSheet {
        RawSheet::new(
            vec!["member_id".into(), "start_hba1c".into()],
            rows.iter().map(|k| vec![k.to_string(), "7.1".into()]).collect(),
        )
    }

    fn lenient() -> PipelineOptions {
        PipelineOptions {
            schema_policy: SchemaPolicy::Lenient,
            ..Default::default()
        }
    }

    #[test]
    fn failure_reports_the_stage_that_was_running() {
        let store = MemoryStore::new().refuse_connections();
        let outcome = SyncPipeline::new(sheet(&["A1"]), store, lenient()).run();

        match outcome {
            SyncOutcome::Failure {
                stage, severity, ..
            } => {
                assert_eq!(stage, RunStage::Loading);
                assert_eq!(severity, Severity::Critical);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn strict_policy_fails_during_cleaning() {
        let store = MemoryStore::new();
        let outcome =
            SyncPipeline::new(sheet(&["A1"]), store.clone(), PipelineOptions::default()).run();

        assert_eq!(outcome.final_stage(), RunStage::Failed);
        assert!(matches!(
            outcome,
            SyncOutcome::Failure { stage: RunStage::Cleaning, severity: Severity::Error, .. }
        ));
        assert_eq!(store.open_connections(), 0);
        assert_eq!(store.commits(), 0);
    }

    #[test]
    fn panicking_source_becomes_a_failure() {
        struct Exploding;
        impl SheetSource for Exploding {
            fn read(&self, _locator: &SheetLocator) -> SyncResult<RawSheet> {
                panic!("boom");
            }
        }

        let outcome = SyncPipeline::new(Exploding, MemoryStore::new(), lenient()).run();
        match outcome {
            SyncOutcome::Failure { stage, message, .. } => {
                assert_eq!(stage, RunStage::Reading);
                assert!(message.contains("boom"), "{message}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn severity_mapping() {
        assert_eq!(
            severity_for_error(&SyncError::authentication("bad key")),
            Severity::Critical
        );
        assert_eq!(
            severity_for_error(&SyncError::MissingColumns {
                missing: vec!["days".into()]
            }),
            Severity::Error
        );
    }
}
