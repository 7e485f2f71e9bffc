use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::SyncError;

use super::{RunStage, SyncStats};

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Error-level event (run failed on its data or configuration).
    Error,
    /// Critical error (credentials, connectivity or other infrastructure failures).
    Critical,
}

/// What a run is syncing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncContext {
    /// Source document locator.
    pub document: String,
    /// Source worksheet.
    pub worksheet: String,
    /// Destination table.
    pub table: String,
}

/// Observer interface for run progress and outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts. Every method defaults to a no-op.
pub trait SyncObserver: Send + Sync {
    /// Called when the run enters `stage`.
    fn on_stage(&self, _ctx: &SyncContext, _stage: RunStage) {}

    /// Called for non-fatal conditions (tolerated missing columns, nulled values, skipped rows).
    fn on_warning(&self, _ctx: &SyncContext, _message: &str) {}

    /// Called when the run commits.
    fn on_success(&self, _ctx: &SyncContext, _stats: &SyncStats) {}

    /// Called when the run fails.
    fn on_failure(&self, _ctx: &SyncContext, _severity: Severity, _error: &SyncError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &SyncContext, severity: Severity, error: &SyncError) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn SyncObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn SyncObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl SyncObserver for CompositeObserver {
    fn on_stage(&self, ctx: &SyncContext, stage: RunStage) {
        for o in &self.observers {
            o.on_stage(ctx, stage);
        }
    }

    fn on_warning(&self, ctx: &SyncContext, message: &str) {
        for o in &self.observers {
            o.on_warning(ctx, message);
        }
    }

    fn on_success(&self, ctx: &SyncContext, stats: &SyncStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &SyncContext, severity: Severity, error: &SyncError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &SyncContext, severity: Severity, error: &SyncError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Forwards events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn on_stage(&self, ctx: &SyncContext, stage: RunStage) {
        tracing::debug!(table = %ctx.table, worksheet = %ctx.worksheet, ?stage, "stage");
    }

    fn on_warning(&self, ctx: &SyncContext, message: &str) {
        tracing::warn!(table = %ctx.table, worksheet = %ctx.worksheet, "{message}");
    }

    fn on_success(&self, ctx: &SyncContext, stats: &SyncStats) {
        tracing::info!(
            table = %ctx.table,
            worksheet = %ctx.worksheet,
            read = stats.rows_read,
            inserted = stats.rows_inserted,
            conflicts = stats.rows_skipped_conflict,
            missing_key = stats.rows_skipped_missing_key,
            nulled = stats.values_nulled,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "sync committed"
        );
    }

    fn on_failure(&self, ctx: &SyncContext, severity: Severity, error: &SyncError) {
        tracing::error!(
            table = %ctx.table,
            worksheet = %ctx.worksheet,
            ?severity,
            %error,
            "sync failed"
        );
    }

    fn on_alert(&self, ctx: &SyncContext, severity: Severity, error: &SyncError) {
        tracing::error!(
            table = %ctx.table,
            worksheet = %ctx.worksheet,
            ?severity,
            %error,
            alert = true,
            "sync failed"
        );
    }
}

/// Appends run events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl SyncObserver for FileObserver {
    fn on_warning(&self, ctx: &SyncContext, message: &str) {
        self.append_line(&format!("{} warn table={} {message}", unix_ts(), ctx.table));
    }

    fn on_success(&self, ctx: &SyncContext, stats: &SyncStats) {
        self.append_line(&format!(
            "{} ok worksheet={} table={} {stats}",
            unix_ts(),
            ctx.worksheet,
            ctx.table
        ));
    }

    fn on_failure(&self, ctx: &SyncContext, severity: Severity, error: &SyncError) {
        self.append_line(&format!(
            "{} fail severity={:?} worksheet={} table={} err={}",
            unix_ts(),
            severity,
            ctx.worksheet,
            ctx.table,
            error
        ));
    }

    fn on_alert(&self, ctx: &SyncContext, severity: Severity, error: &SyncError) {
        self.append_line(&format!(
            "{} ALERT severity={:?} worksheet={} table={} err={}",
            unix_ts(),
            severity,
            ctx.worksheet,
            ctx.table,
            error
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
