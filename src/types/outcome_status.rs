//! Terminal status attached to every processed record.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Terminal status of one record's workflow. Closed set; the run log only ever
/// carries these labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
  Submitted,
  NotAvailable,
  PriceError,
  InvalidAmount,
  WarehouseNotFound,
  IndivisiblePack,
  Error,
  AlreadyCompleted,
}

impl OutcomeStatus {
  /// Label written to the run log's status column.
  pub fn label(self) -> &'static str {
    match self {
      OutcomeStatus::Submitted => "Submitted",
      OutcomeStatus::NotAvailable => "Not Available",
      OutcomeStatus::PriceError => "Price Error",
      OutcomeStatus::InvalidAmount => "Invalid Amount",
      OutcomeStatus::WarehouseNotFound => "Warehouse Not Found",
      OutcomeStatus::IndivisiblePack => "Indivisible Pack",
      OutcomeStatus::Error => "Error",
      OutcomeStatus::AlreadyCompleted => "Already Completed",
    }
  }

  /// True when the record reached a state the operator does not need to revisit.
  pub fn is_settled(self) -> bool {
    matches!(self, OutcomeStatus::Submitted | OutcomeStatus::AlreadyCompleted)
  }
}

impl fmt::Display for OutcomeStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}
