//! Error kinds: surface failures, record-scoped step failures and run-level errors.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::{OutcomeStatus, WorkflowState};

/// Failure talking to the external page surface.
#[derive(Debug, Error)]
pub enum SurfaceError {
  /// A bounded wait elapsed.
  #[error("timed out after {elapsed:?} waiting for {what}")]
  Timeout { what: String, elapsed: Duration },
  /// The target or table is not on the current page.
  #[error("not found on page: {0}")]
  NotFound(String),
  /// The surface answered with something it should not have.
  #[error("surface protocol error: {0}")]
  Protocol(String),
  /// The surface was already released.
  #[error("surface is closed")]
  Closed,
}

impl SurfaceError {
  pub fn is_timeout(&self) -> bool {
    matches!(self, SurfaceError::Timeout { .. })
  }
}

/// Record-scoped failure inside a submission workflow. Never fatal for the run.
#[derive(Debug, Error)]
pub enum StepFailure {
  /// A step's continue control did not appear within the element wait.
  #[error("{state}: control '{control}' not found")]
  ControlMissing {
    state: WorkflowState,
    control: String,
  },
  #[error(transparent)]
  Surface(#[from] SurfaceError),
  #[error("no {table} entry for '{key}'")]
  LookupMiss { table: String, key: String },
  #[error("not available: {0}")]
  NotAvailable(String),
  #[error("cannot parse amount '{raw}'")]
  InvalidAmount { raw: String },
  #[error("displayed total {displayed:.2} does not match expected {expected:.2}")]
  PriceMismatch { displayed: f64, expected: f64 },
  #[error("pack count {pack} is not divisible by master pack {master_pack}")]
  IndivisiblePack { pack: u32, master_pack: u32 },
  /// A required record field was missing or malformed.
  #[error("record field '{0}' missing or invalid")]
  BadRecord(String),
  #[error(transparent)]
  Eta(#[from] EtaError),
}

impl StepFailure {
  /// Status logged for this failure.
  pub fn status(&self) -> OutcomeStatus {
    match self {
      StepFailure::ControlMissing { .. }
      | StepFailure::Surface(_)
      | StepFailure::BadRecord(_)
      | StepFailure::Eta(_) => OutcomeStatus::Error,
      StepFailure::LookupMiss { .. } => OutcomeStatus::WarehouseNotFound,
      StepFailure::NotAvailable(_) => OutcomeStatus::NotAvailable,
      StepFailure::InvalidAmount { .. } => OutcomeStatus::InvalidAmount,
      StepFailure::PriceMismatch { .. } => OutcomeStatus::PriceError,
      StepFailure::IndivisiblePack { .. } => OutcomeStatus::IndivisiblePack,
    }
  }

  /// Reconciliation mismatches leave the page mid-wizard; the next record must
  /// start from a known page.
  pub fn needs_recovery(&self) -> bool {
    matches!(
      self,
      StepFailure::PriceMismatch { .. } | StepFailure::IndivisiblePack { .. }
    )
  }

  /// Surface hiccups inside a fill sub-step get one more attempt.
  pub fn is_retryable(&self) -> bool {
    matches!(self, StepFailure::Surface(_))
  }
}

/// Transit-day count rejected by the ETA calculator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EtaError {
  #[error("transit days must be non-negative, got {0}")]
  Negative(i64),
}

/// Run-level error. Caught only at the top of the binary.
#[derive(Debug, Error)]
pub enum PortalError {
  #[error("{path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("{path}: {source}")]
  Csv {
    path: PathBuf,
    #[source]
    source: csv::Error,
  },
  #[error("invalid config: {0}")]
  Config(String),
  #[error("invalid date '{input}': expected MM/DD/YYYY")]
  Date { input: String },
  #[error("cannot attach to browser: {0}")]
  Connect(String),
  #[error(transparent)]
  Surface(#[from] SurfaceError),
  #[error(transparent)]
  Json(#[from] serde_json::Error),
}

impl PortalError {
  pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    PortalError::Io {
      path: path.into(),
      source,
    }
  }

  pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
    PortalError::Csv {
      path: path.into(),
      source,
    }
  }
}
