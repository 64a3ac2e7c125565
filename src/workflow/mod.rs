//! Submission workflows: the per-record state machine and the flows it drives.
//!
//! [run_workflow] walks a [StepMachine] from `Start` to `Submit`. At each state
//! the flow is asked whether it takes part ([SubmissionFlow::uses]):
//!
//! - step states (`Step2`, `Step3`, `Step4`) locate and click their continue
//!   control; a control that does not show up within the element wait fails
//!   the record at that state;
//! - `FillFields` runs the flow's fill sub-steps in order, each retried once
//!   after a surface hiccup;
//! - `Start` and `Submit` are handed to [SubmissionFlow::enter].
//!
//! Every failure is record-scoped: it becomes the record's [OutcomeRow].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::{StepFailure, SurfaceError};
use crate::surface::{Driver, Target};
use crate::types::{
  OutcomeRow, OutcomeStatus, Record, RecordSet, RunContext, StepMachine, WorkflowState,
};

mod invoice;
#[cfg(test)]
mod invoice_test;
mod labels;
mod print;
mod shipment;
#[cfg(test)]
mod workflow_test;

pub use invoice::{InvoiceFlow, InvoiceSettings};
pub use labels::{LabelPrepFlow, LabelSettings};
pub use print::{PrintFlow, PrintSettings};
pub use shipment::{ShipmentFlow, ShipmentSettings};

/// What a state handler wants the machine to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepFlow {
  /// Move on to the next state.
  Continue,
  /// Stop here with a settled status (e.g. nothing left to do).
  Finish(OutcomeStatus),
}

/// One kind of submission wizard.
#[async_trait]
pub trait SubmissionFlow: Send + Sync {
  /// Short name used in logs and the run log header (`shipment`, `invoice`).
  fn name(&self) -> &'static str;

  /// Run log header: id column, attribute columns, `Status`.
  fn log_columns(&self) -> Vec<String>;

  /// Whether this flow does anything in `state`. Unused states are passed
  /// through without touching the page.
  fn uses(&self, state: WorkflowState) -> bool;

  /// Named sub-steps of `FillFields`, in order.
  fn fill_steps(&self) -> &'static [&'static str] {
    &[]
  }

  /// Handles `Start` and `Submit`.
  async fn enter(
    &self,
    state: WorkflowState,
    driver: &mut Driver,
    record: &Record,
    ctx: &mut RunContext,
  ) -> Result<StepFlow, StepFailure>;

  /// Runs one `FillFields` sub-step.
  async fn fill(
    &self,
    _step: &str,
    _driver: &mut Driver,
    _record: &Record,
    _ctx: &mut RunContext,
  ) -> Result<StepFlow, StepFailure> {
    Ok(StepFlow::Continue)
  }

  /// Id cell of the record's log row. Defaults to the record id.
  fn log_id(&self, record: &Record) -> String {
    record.id().to_string()
  }

  /// Attribute cells for the record's log row, in header order.
  fn attributes(&self, record: &Record, ctx: &RunContext) -> Vec<String>;

  /// Known page to return to after a reconciliation mismatch.
  fn recovery_url(&self) -> Option<&str> {
    None
  }

  /// Reorders records before processing. Default keeps pagination order.
  fn prepare(&self, _records: &mut RecordSet) {}
}

/// Literal substitution applied to a rendered detail URL (e.g. turning a
/// listing's detail link into its submission page).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRewrite {
  pub from: String,
  pub to: String,
}

/// Renders `template` for `record` and applies `rewrites` in order.
pub fn detail_url(
  template: &str,
  rewrites: &[LinkRewrite],
  record: &Record,
) -> Result<String, StepFailure> {
  let url = render_url(template, record)?;
  Ok(
    rewrites
      .iter()
      .fold(url, |url, r| url.replace(&r.from, &r.to)),
  )
}

/// Header helper: `id`, `attributes...`, `Status`.
pub(crate) fn columns(names: &[&str]) -> Vec<String> {
  names
    .iter()
    .map(|s| s.to_string())
    .chain(std::iter::once("Status".to_string()))
    .collect()
}

/// Fills `{id}` and `{field}` placeholders from `record`.
///
/// A placeholder the record cannot fill is a [StepFailure::BadRecord].
pub fn render_url(template: &str, record: &Record) -> Result<String, StepFailure> {
  let mut url = template.replace("{id}", record.id());
  for (name, value) in record.fields() {
    url = url.replace(&format!("{{{name}}}"), &value.as_text());
  }
  if let Some(start) = url.find('{')
    && let Some(len) = url[start..].find('}')
  {
    return Err(StepFailure::BadRecord(url[start + 1..start + len].to_string()));
  }
  Ok(url)
}

/// Drives one record through `flow` and returns its outcome row.
#[instrument(level = "trace", skip_all, fields(flow = flow.name(), record_id = %record.id()))]
pub async fn run_workflow(
  flow: &dyn SubmissionFlow,
  driver: &mut Driver,
  record: &Record,
) -> OutcomeRow {
  let mut machine = StepMachine::new();
  let mut ctx = RunContext::new();
  let status = match drive(flow, driver, record, &mut machine, &mut ctx).await {
    Ok(status) => status,
    Err(failure) => {
      let at = machine.state();
      machine.fail();
      warn!(record_id = %record.id(), state = %at, error = %failure, "record failed");
      if failure.needs_recovery() {
        recover(flow, driver).await;
      }
      failure.status()
    }
  };
  info!(record_id = %record.id(), status = %status, "record processed");
  OutcomeRow::new(flow.log_id(record), flow.attributes(record, &ctx), status)
}

async fn drive(
  flow: &dyn SubmissionFlow,
  driver: &mut Driver,
  record: &Record,
  machine: &mut StepMachine,
  ctx: &mut RunContext,
) -> Result<OutcomeStatus, StepFailure> {
  loop {
    let state = machine.state();
    if state.is_terminal() {
      return Ok(OutcomeStatus::Submitted);
    }
    if flow.uses(state) {
      let step = match (state, state.continue_control()) {
        (_, Some(control)) => {
          continue_step(driver, state, control).await?;
          StepFlow::Continue
        }
        (WorkflowState::FillFields, None) => fill_fields(flow, driver, record, ctx).await?,
        _ => flow.enter(state, driver, record, ctx).await?,
      };
      if let StepFlow::Finish(status) = step {
        return Ok(status);
      }
    }
    machine.advance();
  }
}

/// Waits for a step's continue control and clicks it.
async fn continue_step(
  driver: &mut Driver,
  state: WorkflowState,
  control: &str,
) -> Result<(), StepFailure> {
  let target = Target::named(control);
  driver.wait_for(&target).await.map_err(|e| match e {
    SurfaceError::Timeout { .. } | SurfaceError::NotFound(_) => StepFailure::ControlMissing {
      state,
      control: control.to_string(),
    },
    other => StepFailure::Surface(other),
  })?;
  driver.click(target).await?;
  driver.settle().await;
  info!(step = %state, "continued");
  Ok(())
}

async fn fill_fields(
  flow: &dyn SubmissionFlow,
  driver: &mut Driver,
  record: &Record,
  ctx: &mut RunContext,
) -> Result<StepFlow, StepFailure> {
  for step in flow.fill_steps() {
    let outcome = match flow.fill(step, driver, record, ctx).await {
      Err(failure) if failure.is_retryable() => {
        warn!(step = *step, error = %failure, "fill step failed, retrying once");
        flow.fill(step, driver, record, ctx).await?
      }
      other => other?,
    };
    if let StepFlow::Finish(status) = outcome {
      return Ok(StepFlow::Finish(status));
    }
  }
  Ok(StepFlow::Continue)
}

/// Returns to the flow's recovery page. Failures here are only logged; the
/// next record starts with its own navigation anyway.
async fn recover(flow: &dyn SubmissionFlow, driver: &mut Driver) {
  let Some(url) = flow.recovery_url() else {
    return;
  };
  match driver.navigate(url).await {
    Ok(()) => {
      driver.settle().await;
      info!(url = %url, "recovered to known page");
    }
    Err(e) => warn!(url = %url, error = %e, "recovery navigation failed"),
  }
}

/// Reads a required text field.
pub(crate) fn required_text(record: &Record, field: &str) -> Result<String, StepFailure> {
  record
    .text(field)
    .filter(|t| !t.trim().is_empty())
    .ok_or_else(|| StepFailure::BadRecord(field.to_string()))
}
