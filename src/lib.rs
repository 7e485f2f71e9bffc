//! `coaching-sheet-sync` loads health-coaching metrics from a Google Sheets worksheet into a
//! PostgreSQL table, idempotently.
//!
//! One run reads the `Clean_data` worksheet, cleans the percentage, numeric and date columns into
//! typed values, and inserts every record into `healthcare_data` keyed on `member_id` with
//! "on conflict do nothing". The whole run is one transaction: it lands completely or not at all.
//! Running it again over unchanged data inserts nothing.
//!
//! The primary entrypoint is [`pipeline::SyncPipeline::run`], which returns a
//! [`pipeline::SyncOutcome`] instead of an error. [`adapters`] wraps it for request/response
//! callers (`{"statusCode": .., "body": ..}`) and for direct invocation.
//!
//! ## Cleaning rules
//!
//! - **Percentage** (`meallog_1d_pct`, `meal_log_7d_pct`, `gfy_7d_pct`): `" 12.5 % "` becomes
//!   `12.5`
//! - **Numeric** (`days`, `days_no_chat`, `start_hba1c`, `last_hba1c`, `weight_change`); a
//!   fractional day count is kept and rounded when bound to an integer column
//! - **Date** (`last_chat_sent_date`, `last_meal_log_date`): `"2023-05-01"` becomes midnight of
//!   that day
//!
//! A value that does not parse is loaded as NULL and counted; it never fails the run.
//!
//! ## Quick example
//!
//! ```rust
//! use coaching_sheet_sync::cleaning::SchemaPolicy;
//! use coaching_sheet_sync::load::MemoryStore;
//! use coaching_sheet_sync::pipeline::{PipelineOptions, SyncPipeline};
//! use coaching_sheet_sync::types::RawSheet;
//!
//! let sheet = RawSheet::new(
//!     vec!["member_id".into(), "meallog_1d_pct".into(), "start_hba1c".into()],
//!     vec![
//!         vec!["A1".into(), "87%".into(), "6.4".into()],
//!         vec!["B2".into(), "n/a".into(), "abc".into()],
//!     ],
//! );
//! let store = MemoryStore::new();
//! let options = PipelineOptions {
//!     schema_policy: SchemaPolicy::Lenient,
//!     ..Default::default()
//! };
//! let pipeline = SyncPipeline::new(sheet, store.clone(), options);
//!
//! let first = pipeline.run();
//! assert_eq!(first.stats().map(|s| s.rows_inserted), Some(2));
//!
//! // Same data again: nothing new.
//! let second = pipeline.run();
//! assert_eq!(second.stats().map(|s| s.rows_inserted), Some(0));
//! assert_eq!(store.row_count(), 2);
//! ```
//!
//! Against the real services:
//!
//! ```no_run
//! use coaching_sheet_sync::config::SyncConfig;
//! use coaching_sheet_sync::pipeline::SyncPipeline;
//!
//! # fn main() -> Result<(), coaching_sheet_sync::SyncError> {
//! let config = SyncConfig::from_env()?;
//! let pipeline = SyncPipeline::new(
//!     config.sheet_source()?,
//!     config.postgres_store()?,
//!     config.pipeline_options(),
//! );
//! println!("{}", pipeline.run());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`source`]: worksheet readers (Sheets API, CSV export)
//! - [`cleaning`]: header validation and value coercion
//! - [`load`]: batch loader and stores (PostgreSQL, in-memory)
//! - [`pipeline`]: orchestration, run outcome, observers
//! - [`adapters`]: request/response and direct-run entry points
//! - [`config`]: environment configuration
//! - [`columns`]: the destination column catalogue
//! - [`types`]: raw and cleaned record types
//! - [`error`]: error types used across stages

pub mod adapters;
pub mod cleaning;
pub mod columns;
pub mod config;
pub mod error;
pub mod load;
pub mod pipeline;
pub mod source;
pub mod types;

pub use error::{SyncError, SyncResult};
