//! Request/response entry point: configured from the environment, prints one JSON response
//! (`{"statusCode": .., "body": ..}`) on stdout and exits non-zero on failure.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use coaching_sheet_sync::SyncResult;
use coaching_sheet_sync::adapters::{HandlerResponse, handle};
use coaching_sheet_sync::config::SyncConfig;
use coaching_sheet_sync::pipeline::{PipelineOptions, SyncPipeline, TracingObserver};

fn respond() -> SyncResult<HandlerResponse> {
    let config = SyncConfig::from_env()?;
    let options = PipelineOptions {
        observer: Some(Arc::new(TracingObserver)),
        ..config.pipeline_options()
    };
    let pipeline = SyncPipeline::new(config.sheet_source()?, config.postgres_store()?, options);
    Ok(handle(&pipeline))
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coaching_sheet_sync=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let response = respond().unwrap_or_else(|e| {
        tracing::error!(error = %e, "handler setup failed");
        HandlerResponse::error(e)
    });

    let json = match response.to_json() {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "cannot serialize response");
            return ExitCode::FAILURE;
        }
    };
    let mut stdout = io::stdout().lock();
    if writeln!(stdout, "{json}").is_err() {
        return ExitCode::FAILURE;
    }

    if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
