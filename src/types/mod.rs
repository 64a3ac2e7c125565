//! Data model shared by extraction, workflows and the run log.

use std::collections::HashMap;

mod outcome_status;
mod record;
mod row_snapshot;
mod run_log;
mod workflow_state;

pub use outcome_status::OutcomeStatus;
pub use record::{FieldValue, Record, RecordSet};
pub use row_snapshot::RowSnapshot;
pub use run_log::{OutcomeRow, RunLog};
pub use workflow_state::{StepMachine, WorkflowState};

/// Per-record scratch values written by workflow steps (e.g. a scraped total)
/// and read back when the outcome row is built.
pub type RunContext = HashMap<String, String>;
