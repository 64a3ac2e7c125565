//! # portal-autopilot
//!
//! Drives a vendor shipment/invoice portal through an attached browser
//! session: paginated record extraction, spreadsheet lookups and multi-step
//! submission wizards, with one outcome row per record in a run log.
//!
//! ## Architecture
//!
//! - [surface]: capability interface over the page ([surface::PageSurface]),
//!   bounded waits ([surface::Driver]), a scripted replay backend and, with
//!   the `browser` feature, a DevTools backend.
//! - [extractor] and [paginator]: rows → records, page after page.
//! - [lookup], [reconcile], [dates]: tables, pack/amount checks, ETA.
//! - [workflow]: the per-record state machine and the four flows.
//! - [runner] and [run_log_io]: sequential processing, interruption, log output.

pub mod config;
pub mod dates;
#[cfg(test)]
mod dates_test;
pub mod error;
pub mod extractor;
pub mod invoice_source;
pub mod lookup;
pub mod paginator;
pub mod reconcile;
pub mod run_log_io;
pub mod runner;
#[cfg(test)]
mod runner_test;
pub mod surface;
#[cfg(test)]
mod test_support;
pub mod types;
pub mod workflow;

pub use config::PortalConfig;
pub use error::{PortalError, StepFailure, SurfaceError};
pub use runner::{RunOptions, collect_records, finish_run, run_records};
pub use types::{OutcomeRow, OutcomeStatus, Record, RecordSet, RunLog};
pub use workflow::{SubmissionFlow, run_workflow};
