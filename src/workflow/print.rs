//! Label printing: open each shipment and press its print control.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{StepFlow, SubmissionFlow, columns, render_url};
use crate::error::StepFailure;
use crate::surface::{Driver, Target};
use crate::types::{Record, RunContext, WorkflowState};

const PRINT_LABELS: &str = "print_labels";

/// Settings for [PrintFlow].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintSettings {
  /// Shipment detail page; `{id}` is the ARN.
  pub detail_url: String,
}

impl Default for PrintSettings {
  fn default() -> Self {
    Self {
      detail_url: "{link}".to_string(),
    }
  }
}

pub struct PrintFlow {
  settings: PrintSettings,
}

impl PrintFlow {
  pub fn new(settings: PrintSettings) -> Self {
    Self { settings }
  }
}

#[async_trait]
impl SubmissionFlow for PrintFlow {
  fn name(&self) -> &'static str {
    "print"
  }

  fn log_columns(&self) -> Vec<String> {
    columns(&["ARN", "Link"])
  }

  fn uses(&self, state: WorkflowState) -> bool {
    matches!(state, WorkflowState::Start | WorkflowState::Submit)
  }

  async fn enter(
    &self,
    state: WorkflowState,
    driver: &mut Driver,
    record: &Record,
    _ctx: &mut RunContext,
  ) -> Result<StepFlow, StepFailure> {
    match state {
      WorkflowState::Start => {
        let url = render_url(&self.settings.detail_url, record)?;
        driver.navigate(&url).await?;
      }
      WorkflowState::Submit => {
        let print = Target::named(PRINT_LABELS);
        driver.wait_for(&print).await?;
        driver.click(print).await?;
        driver.settle().await;
      }
      _ => {}
    }
    Ok(StepFlow::Continue)
  }

  fn attributes(&self, record: &Record, _ctx: &RunContext) -> Vec<String> {
    vec![render_url(&self.settings.detail_url, record).unwrap_or_default()]
  }
}
