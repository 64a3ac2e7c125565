//! DTOs for the run log: one outcome row per processed record.

use serde::{Deserialize, Serialize};

use super::OutcomeStatus;

/// Outcome of one record's workflow. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRow {
  /// Record identifier (ARN, PO number, ...).
  pub record_id: String,
  /// Key attributes in the order of the log's attribute columns.
  pub attributes: Vec<String>,
  pub status: OutcomeStatus,
}

impl OutcomeRow {
  pub fn new(
    record_id: impl Into<String>,
    attributes: Vec<String>,
    status: OutcomeStatus,
  ) -> Self {
    Self {
      record_id: record_id.into(),
      attributes,
      status,
    }
  }

  /// Cells for one log line: id, attributes, status label.
  pub fn cells(&self) -> Vec<String> {
    let mut cells = Vec::with_capacity(self.attributes.len() + 2);
    cells.push(self.record_id.clone());
    cells.extend(self.attributes.iter().cloned());
    cells.push(self.status.label().to_string());
    cells
  }
}

/// Append-only sequence of outcome rows for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLog {
  /// Log format version.
  pub version: u32,
  /// Random id of this run.
  pub run_id: String,
  /// Workflow that produced the rows (e.g. "shipment").
  pub flow: String,
  /// Header: id column, attribute columns, status column.
  pub columns: Vec<String>,
  /// RFC 3339 timestamp when the run started.
  pub started_at: String,
  /// Set when the run was cut short by an operator interrupt.
  pub interrupted: bool,
  rows: Vec<OutcomeRow>,
}

impl RunLog {
  pub fn new(flow: impl Into<String>, columns: Vec<String>) -> Self {
    Self {
      version: 1,
      run_id: uuid::Uuid::new_v4().to_string(),
      flow: flow.into(),
      columns,
      started_at: chrono::Utc::now().to_rfc3339(),
      interrupted: false,
      rows: Vec::new(),
    }
  }

  pub fn append(&mut self, row: OutcomeRow) {
    self.rows.push(row);
  }

  pub fn rows(&self) -> &[OutcomeRow] {
    &self.rows
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  /// Number of rows per status label, in first-seen order.
  pub fn tally(&self) -> Vec<(OutcomeStatus, usize)> {
    let mut out: Vec<(OutcomeStatus, usize)> = Vec::new();
    for row in &self.rows {
      match out.iter_mut().find(|(s, _)| *s == row.status) {
        Some((_, n)) => *n += 1,
        None => out.push((row.status, 1)),
      }
    }
    out
  }
}
