//! Invocation adapters over [`SyncPipeline::run`].
//!
//! - [`handle`]: request/response style, returns a [`HandlerResponse`] (`statusCode` + `body`)
//! - [`run_direct`]: direct invocation, writes the outcome line; [`exit_code`] maps it for the
//!   process
//!
//! Both are thin: the run itself and its observer reporting live in the pipeline.

use std::io::{self, Write};
use std::process::ExitCode;

use serde::{Deserialize, Serialize};

use crate::load::Store;
use crate::pipeline::{SyncOutcome, SyncPipeline};
use crate::source::SheetSource;

/// Body returned with status 200.
pub const SUCCESS_BODY: &str = "ETL process completed successfully!";

/// Response of the request/response adapter.
///
/// Serializes as `{"statusCode": 200, "body": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResponse {
    pub status_code: u16,
    pub body: String,
}

impl HandlerResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            body: body.into(),
        }
    }

    /// A 500 response whose body is `Error: <message>`.
    pub fn error(message: impl std::fmt::Display) -> Self {
        Self {
            status_code: 500,
            body: format!("Error: {message}"),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<&SyncOutcome> for HandlerResponse {
    fn from(outcome: &SyncOutcome) -> Self {
        match outcome {
            SyncOutcome::Success(_) => HandlerResponse::ok(SUCCESS_BODY),
            SyncOutcome::Failure { message, .. } => HandlerResponse::error(message),
        }
    }
}

/// Run once and answer in request/response form.
pub fn handle<S: SheetSource, D: Store>(pipeline: &SyncPipeline<S, D>) -> HandlerResponse {
    HandlerResponse::from(&pipeline.run())
}

/// Run once and write a one-line summary to `out`.
pub fn run_direct<S, D, W>(pipeline: &SyncPipeline<S, D>, out: &mut W) -> io::Result<SyncOutcome>
where
    S: SheetSource,
    D: Store,
    W: Write,
{
    let outcome = pipeline.run();
    report(&outcome, out)?;
    Ok(outcome)
}

/// Write the outcome line (`ok: ...` or `error [stage]: ...`).
pub fn report<W: Write>(outcome: &SyncOutcome, out: &mut W) -> io::Result<()> {
    match outcome {
        SyncOutcome::Success(_) => writeln!(out, "ok: {outcome}"),
        SyncOutcome::Failure { stage, .. } => writeln!(out, "error [{stage}]: {outcome}"),
    }
}

pub fn exit_code(outcome: &SyncOutcome) -> ExitCode {
    if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
