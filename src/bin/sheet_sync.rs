use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use coaching_sheet_sync::adapters::{exit_code, run_direct};
use coaching_sheet_sync::config::{self, SyncConfig};
use coaching_sheet_sync::load::MemoryStore;
use coaching_sheet_sync::pipeline::{
    CompositeObserver, FileObserver, PipelineOptions, Severity, SyncObserver, SyncPipeline,
    TracingObserver,
};

#[derive(Parser)]
#[command(name = "sheet-sync")]
#[command(about = "Load the Clean_data worksheet into the healthcare_data table")]
#[command(long_about = "Load the Clean_data worksheet into the healthcare_data table.

Reads the worksheet, cleans percentage, numeric and date columns, and inserts
every row keyed on member_id. Rows already in the table are left untouched, so
running it twice over the same sheet inserts nothing the second time.

Every option can also be set through the environment variable shown next to it,
or in a .env file in the working directory.

EXAMPLES:
  sheet-sync --sheet-url https://docs.google.com/spreadsheets/d/<id>/edit
  sheet-sync --csv-export ./exports --dry-run")]
#[command(version)]
struct Cli {
    /// Spreadsheet URL or id.
    #[arg(long, env = config::SHEET_URL)]
    sheet_url: Option<String>,

    /// Worksheet to read.
    #[arg(long, env = config::SHEET_WORKSHEET, default_value = "Clean_data")]
    worksheet: String,

    /// Read a CSV export (file, or directory holding <worksheet>.csv) instead of the Sheets API.
    #[arg(long, env = config::SHEET_CSV_EXPORT)]
    csv_export: Option<PathBuf>,

    /// Service-account key file.
    #[arg(long, env = config::GOOGLE_APPLICATION_CREDENTIALS)]
    credentials_file: Option<PathBuf>,

    /// PostgreSQL connection URL.
    #[arg(long, env = config::DATABASE_URL, hide_env_values = true)]
    database_url: Option<String>,

    /// Destination table.
    #[arg(long, env = config::SYNC_TABLE)]
    table: Option<String>,

    /// Rows per INSERT statement.
    #[arg(long, env = config::SYNC_PAGE_SIZE)]
    page_size: Option<usize>,

    /// `strict` fails when a column is missing from the sheet, `lenient` loads it as null.
    #[arg(long, env = config::SYNC_SCHEMA_POLICY)]
    schema_policy: Option<String>,

    /// Create the destination table if it does not exist.
    #[arg(long)]
    create_table: bool,

    /// Append run events to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Clean and load into an in-memory table; the database is not touched.
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    /// Present the arguments under their environment variable names. Variables without a flag
    /// (inline credentials, timeouts) are read from the environment.
    fn lookup(&self) -> HashMap<&'static str, String> {
        let mut vars = HashMap::new();
        let path = |p: &PathBuf| p.display().to_string();
        vars.insert(config::SHEET_WORKSHEET, self.worksheet.clone());
        if let Some(v) = &self.sheet_url {
            vars.insert(config::SHEET_URL, v.clone());
        }
        if let Some(v) = &self.csv_export {
            vars.insert(config::SHEET_CSV_EXPORT, path(v));
        }
        if let Some(v) = &self.credentials_file {
            vars.insert(config::GOOGLE_APPLICATION_CREDENTIALS, path(v));
        }
        if let Some(v) = &self.database_url {
            vars.insert(config::DATABASE_URL, v.clone());
        }
        if let Some(v) = &self.table {
            vars.insert(config::SYNC_TABLE, v.clone());
        }
        if let Some(v) = self.page_size {
            vars.insert(config::SYNC_PAGE_SIZE, v.to_string());
        }
        if let Some(v) = &self.schema_policy {
            vars.insert(config::SYNC_SCHEMA_POLICY, v.clone());
        }
        if self.create_table {
            vars.insert(config::SYNC_CREATE_TABLE, "true".to_string());
        }
        vars
    }
}

fn main() -> anyhow::Result<ExitCode> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coaching_sheet_sync=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let vars = cli.lookup();
    let config = SyncConfig::from_lookup(|key| {
        vars.get(key)
            .cloned()
            .or_else(|| std::env::var(key).ok())
    })
    .context("invalid configuration")?;

    let mut observers: Vec<Arc<dyn SyncObserver>> =
        vec![Arc::new(TracingObserver) as Arc<dyn SyncObserver>];
    if let Some(path) = &cli.log_file {
        observers.push(Arc::new(FileObserver::new(path)));
    }
    let options = PipelineOptions {
        observer: Some(Arc::new(CompositeObserver::new(observers))),
        alert_at_or_above: Severity::Critical,
        ..config.pipeline_options()
    };

    let source = config.sheet_source().context("cannot build sheet reader")?;
    let mut stdout = io::stdout().lock();
    let outcome = if cli.dry_run {
        let pipeline = SyncPipeline::new(source, MemoryStore::new(), options);
        run_direct(&pipeline, &mut stdout)?
    } else {
        let store = config.postgres_store().context("cannot configure database")?;
        let pipeline = SyncPipeline::new(source, store, options);
        run_direct(&pipeline, &mut stdout)?
    };
    Ok(exit_code(&outcome))
}
