//! Tests for run orchestration and interruption.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::oneshot;

use crate::error::StepFailure;
use crate::extractor::{DateFilter, ExtractOptions};
use crate::paginator::PaginationSpec;
use crate::run_log_io::{load_progress, progress_path};
use crate::runner::{RunOptions, collect_records, finish_run, run_records};
use crate::surface::Driver;
use crate::surface::replay::ReplayScript;
use crate::test_support::{listing_record, replay_driver};
use crate::types::{OutcomeStatus, Record, RecordSet, RowSnapshot, RunContext, WorkflowState};
use crate::workflow::{StepFlow, SubmissionFlow};

/// Submits every record instantly, except `stop_at`, which signals the
/// shutdown channel and then never finishes.
struct StopFlow {
  stop_at: &'static str,
  trigger: Mutex<Option<oneshot::Sender<()>>>,
}

impl StopFlow {
  fn new(stop_at: &'static str) -> (Self, oneshot::Receiver<()>) {
    let (tx, rx) = oneshot::channel();
    (
      Self {
        stop_at,
        trigger: Mutex::new(Some(tx)),
      },
      rx,
    )
  }
}

#[async_trait]
impl SubmissionFlow for StopFlow {
  fn name(&self) -> &'static str {
    "stop"
  }

  fn log_columns(&self) -> Vec<String> {
    vec!["Id".into(), "Status".into()]
  }

  fn uses(&self, state: WorkflowState) -> bool {
    state == WorkflowState::Start
  }

  async fn enter(
    &self,
    _state: WorkflowState,
    _driver: &mut Driver,
    record: &Record,
    _ctx: &mut RunContext,
  ) -> Result<StepFlow, StepFailure> {
    if record.id() == self.stop_at {
      let tx = self.trigger.lock().unwrap().take();
      if let Some(tx) = tx {
        let _ = tx.send(());
      }
      std::future::pending::<()>().await;
    }
    if record.id().starts_with('x') {
      return Err(StepFailure::NotAvailable(record.id().to_string()));
    }
    Ok(StepFlow::Continue)
  }

  fn attributes(&self, _record: &Record, _ctx: &RunContext) -> Vec<String> {
    Vec::new()
  }
}

fn records(ids: &[&str]) -> RecordSet {
  ids
    .iter()
    .map(|id| listing_record(id, "ONT8", "l"))
    .collect()
}

async fn shutdown_on(rx: oneshot::Receiver<()>) {
  let _ = rx.await;
}

#[tokio::test]
async fn interrupted_run_keeps_completed_rows_in_order() {
  let (flow, rx) = StopFlow::new("r4");
  let (mut driver, _probe) = replay_driver(ReplayScript::default());
  let log = run_records(
    &flow,
    &mut driver,
    records(&["r1", "x2", "r3", "r4", "r5", "r6"]),
    RunOptions::default(),
    shutdown_on(rx),
  )
  .await;

  assert!(log.interrupted);
  let ids: Vec<&str> = log.rows().iter().map(|r| r.record_id.as_str()).collect();
  assert_eq!(ids, vec!["r1", "x2", "r3"]);
  let statuses: Vec<OutcomeStatus> = log.rows().iter().map(|r| r.status).collect();
  assert_eq!(
    statuses,
    vec![
      OutcomeStatus::Submitted,
      OutcomeStatus::NotAvailable,
      OutcomeStatus::Submitted
    ]
  );
}

#[tokio::test]
async fn uninterrupted_run_logs_every_record() {
  let (flow, _rx) = StopFlow::new("never");
  let (mut driver, _probe) = replay_driver(ReplayScript::default());
  let log = run_records(
    &flow,
    &mut driver,
    records(&["a", "b", "c"]),
    RunOptions::default(),
    std::future::pending::<()>(),
  )
  .await;
  assert!(!log.interrupted);
  assert_eq!(log.len(), 3);
  assert_eq!(log.flow, "stop");
}

#[tokio::test]
async fn progress_file_tracks_rows_as_they_land() {
  let dir = tempfile::tempdir().unwrap();
  let progress = progress_path(&dir.path().join("run.csv"));
  let (flow, rx) = StopFlow::new("b");
  let (mut driver, _probe) = replay_driver(ReplayScript::default());
  let log = run_records(
    &flow,
    &mut driver,
    records(&["a", "b"]),
    RunOptions {
      progress: Some(progress.as_path()),
    },
    shutdown_on(rx),
  )
  .await;

  let saved = load_progress(&progress).unwrap();
  assert_eq!(saved.len(), 1);
  assert_eq!(saved.run_id, log.run_id);
}

#[tokio::test]
async fn collect_then_finish_writes_log_and_releases_surface() {
  let ship = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
  let row = |id: &str, date: &str| {
    RowSnapshot::new()
      .with("id", id)
      .with("date", date)
      .with("location", "ONT8, Moreno Valley, CA")
      .with("link", format!("/asn/{id}"))
  };
  let script = ReplayScript {
    result_pages: vec![
      vec![row("A1", "Pickup: Fri, Mar 7, 2025"), row("A2", "Pickup: Mar 8, 2025")],
      vec![row("A3", "Pickup: Fri, Mar 7, 2025")],
    ],
    ..Default::default()
  };
  let (mut driver, probe) = replay_driver(script);
  let options = ExtractOptions {
    link_base: Some("https://portal".into()),
  };
  let set = collect_records(
    &mut driver,
    "https://portal/queue",
    &PaginationSpec::default(),
    &DateFilter::for_date(ship),
    &options,
  )
  .await
  .unwrap();
  assert_eq!(set.ids(), vec!["A1", "A3"]);
  assert_eq!(
    set.get("A3").and_then(|r| r.text("link")).as_deref(),
    Some("https://portal/asn/A3")
  );
  assert_eq!(probe.visited(), vec!["https://portal/queue"]);

  let (flow, _rx) = StopFlow::new("never");
  let log = run_records(
    &flow,
    &mut driver,
    set,
    RunOptions::default(),
    std::future::pending::<()>(),
  )
  .await;
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("out.csv");
  let written = finish_run(driver, log, &path).await.unwrap();
  assert_eq!(written, 2);
  assert!(probe.is_closed());
  assert!(std::fs::read_to_string(&path).unwrap().starts_with("Id,Status"));
}
