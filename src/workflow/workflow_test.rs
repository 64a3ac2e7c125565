//! Tests for the workflow executor and URL rendering.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{StepFlow, SubmissionFlow, columns, render_url, run_workflow};
use crate::error::{StepFailure, SurfaceError};
use crate::surface::replay::ReplayPage;
use crate::surface::Driver;
use crate::test_support::{clicked, listing_record, one_page, replay_driver};
use crate::types::{FieldValue, OutcomeStatus, Record, RunContext, WorkflowState};

const URL: &str = "https://portal/r/1";

/// Scripted flow: records every call; `fail_fill` decides what a fill step
/// returns on its n-th attempt.
struct ScriptedFlow {
  used: Vec<WorkflowState>,
  calls: Mutex<Vec<String>>,
  fail_fill: fn(&str, usize) -> Option<StepFailure>,
  finish_at: Option<&'static str>,
}

impl ScriptedFlow {
  fn new(used: Vec<WorkflowState>) -> Self {
    Self {
      used,
      calls: Mutex::new(Vec::new()),
      fail_fill: |_, _| None,
      finish_at: None,
    }
  }

  fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }
}

#[async_trait]
impl SubmissionFlow for ScriptedFlow {
  fn name(&self) -> &'static str {
    "scripted"
  }

  fn log_columns(&self) -> Vec<String> {
    columns(&["Id"])
  }

  fn uses(&self, state: WorkflowState) -> bool {
    self.used.contains(&state)
  }

  fn fill_steps(&self) -> &'static [&'static str] {
    &["first", "second"]
  }

  async fn enter(
    &self,
    state: WorkflowState,
    driver: &mut Driver,
    _record: &Record,
    _ctx: &mut RunContext,
  ) -> Result<StepFlow, StepFailure> {
    self.calls.lock().unwrap().push(state.to_string());
    if state == WorkflowState::Start {
      driver.navigate(URL).await?;
    }
    Ok(StepFlow::Continue)
  }

  async fn fill(
    &self,
    step: &str,
    _driver: &mut Driver,
    _record: &Record,
    ctx: &mut RunContext,
  ) -> Result<StepFlow, StepFailure> {
    let attempt = {
      let mut calls = self.calls.lock().unwrap();
      calls.push(step.to_string());
      calls.iter().filter(|c| *c == step).count()
    };
    ctx.insert("last".into(), step.to_string());
    if let Some(failure) = (self.fail_fill)(step, attempt) {
      return Err(failure);
    }
    if self.finish_at == Some(step) {
      return Ok(StepFlow::Finish(OutcomeStatus::AlreadyCompleted));
    }
    Ok(StepFlow::Continue)
  }

  fn attributes(&self, _record: &Record, ctx: &RunContext) -> Vec<String> {
    vec![ctx.get("last").cloned().unwrap_or_default()]
  }
}

fn all_steps_page() -> ReplayPage {
  ReplayPage {
    controls: vec![
      "continue_step_2".into(),
      "continue_step_3".into(),
      "continue_step_4".into(),
    ],
    ..Default::default()
  }
}

fn every_state() -> Vec<WorkflowState> {
  vec![
    WorkflowState::Start,
    WorkflowState::Step2,
    WorkflowState::Step3,
    WorkflowState::FillFields,
    WorkflowState::Step4,
    WorkflowState::Submit,
  ]
}

fn record() -> Record {
  listing_record("R1", "ONT8", URL)
}

#[tokio::test]
async fn states_run_in_order_with_continue_clicks() {
  let flow = ScriptedFlow::new(every_state());
  let (mut driver, probe) = replay_driver(one_page(URL, all_steps_page()));
  let row = run_workflow(&flow, &mut driver, &record()).await;

  assert_eq!(row.status, OutcomeStatus::Submitted);
  assert_eq!(row.record_id, "R1");
  assert_eq!(flow.calls(), vec!["start", "first", "second", "submit"]);
  assert_eq!(
    clicked(&probe),
    vec!["continue_step_2", "continue_step_3", "continue_step_4"]
  );
}

#[tokio::test]
async fn unused_states_are_passed_through() {
  let flow = ScriptedFlow::new(vec![WorkflowState::Start, WorkflowState::Submit]);
  let (mut driver, probe) = replay_driver(one_page(URL, ReplayPage::default()));
  let row = run_workflow(&flow, &mut driver, &record()).await;

  assert_eq!(row.status, OutcomeStatus::Submitted);
  assert_eq!(flow.calls(), vec!["start", "submit"]);
  assert!(clicked(&probe).is_empty());
}

#[tokio::test]
async fn surface_failure_in_fill_step_is_retried_once() {
  let mut flow = ScriptedFlow::new(every_state());
  flow.fail_fill = |step, attempt| {
    (step == "first" && attempt == 1)
      .then(|| StepFailure::Surface(SurfaceError::NotFound("cell".into())))
  };
  let (mut driver, _probe) = replay_driver(one_page(URL, all_steps_page()));
  let row = run_workflow(&flow, &mut driver, &record()).await;

  assert_eq!(row.status, OutcomeStatus::Submitted);
  assert_eq!(
    flow.calls(),
    vec!["start", "first", "first", "second", "submit"]
  );
}

#[tokio::test]
async fn second_surface_failure_fails_the_record() {
  let mut flow = ScriptedFlow::new(every_state());
  flow.fail_fill =
    |step, _| (step == "second").then(|| StepFailure::Surface(SurfaceError::Closed));
  let (mut driver, _probe) = replay_driver(one_page(URL, all_steps_page()));
  let row = run_workflow(&flow, &mut driver, &record()).await;

  assert_eq!(row.status, OutcomeStatus::Error);
  assert_eq!(flow.calls(), vec!["start", "first", "second", "second"]);
  assert_eq!(row.attributes, vec!["second"]);
}

#[tokio::test]
async fn lookup_miss_is_not_retried() {
  let mut flow = ScriptedFlow::new(every_state());
  flow.fail_fill = |step, _| {
    (step == "first").then(|| StepFailure::LookupMiss {
      table: "transit days".into(),
      key: "X".into(),
    })
  };
  let (mut driver, probe) = replay_driver(one_page(URL, all_steps_page()));
  let row = run_workflow(&flow, &mut driver, &record()).await;

  assert_eq!(row.status, OutcomeStatus::WarehouseNotFound);
  assert_eq!(flow.calls(), vec!["start", "first"]);
  assert_eq!(clicked(&probe), vec!["continue_step_2", "continue_step_3"]);
}

#[tokio::test]
async fn finish_stops_before_later_states() {
  let mut flow = ScriptedFlow::new(every_state());
  flow.finish_at = Some("first");
  let (mut driver, probe) = replay_driver(one_page(URL, all_steps_page()));
  let row = run_workflow(&flow, &mut driver, &record()).await;

  assert_eq!(row.status, OutcomeStatus::AlreadyCompleted);
  assert_eq!(flow.calls(), vec!["start", "first"]);
  assert!(!clicked(&probe).contains(&"continue_step_4".to_string()));
}

#[test]
fn url_templates_fill_id_and_fields() {
  let mut fields = BTreeMap::new();
  fields.insert("location".to_string(), FieldValue::Text("ONT8".into()));
  let record = Record::new("A1", fields);
  assert_eq!(
    render_url("https://p/{location}/{id}", &record).unwrap(),
    "https://p/ONT8/A1"
  );
  match render_url("https://p/{missing}", &record) {
    Err(StepFailure::BadRecord(name)) => assert_eq!(name, "missing"),
    other => panic!("expected bad record, got {other:?}"),
  }
}
