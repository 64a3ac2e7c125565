//! Run orchestration: collect records, drive each through a flow, flush the log.
//!
//! - [collect_records]: open the listing and paginate it into a [RecordSet].
//! - [run_records]: process records one at a time, racing each against the
//!   shutdown signal.
//! - [finish_run]: release the surface and write the run log exactly once.

use std::future::Future;
use std::path::Path;

use tracing::{info, instrument, warn};

use crate::error::PortalError;
use crate::extractor::{ExtractOptions, RowFilter};
use crate::paginator::{PaginationSpec, paginate};
use crate::run_log_io::{flush_csv, write_progress};
use crate::surface::Driver;
use crate::types::{RecordSet, RunLog};
use crate::workflow::{SubmissionFlow, run_workflow};

/// Options for [run_records].
#[derive(Debug, Default, Clone, Copy)]
pub struct RunOptions<'a> {
  /// If set, the log is rewritten here as JSON after every record.
  pub progress: Option<&'a Path>,
}

/// Navigates to the listing at `start_url` and collects every matching record.
#[instrument(level = "trace", skip(driver, spec, filter, options))]
pub async fn collect_records(
  driver: &mut Driver,
  start_url: &str,
  spec: &PaginationSpec,
  filter: &impl RowFilter,
  options: &ExtractOptions,
) -> Result<RecordSet, PortalError> {
  driver.navigate(start_url).await?;
  driver.settle().await;
  let records = paginate(driver, spec, filter, options, RecordSet::new()).await;
  info!(records = records.len(), "records collected");
  Ok(records)
}

/// Runs every record through `flow`, in order, one at a time.
///
/// `shutdown` is raced against each record. When it fires, the in-flight
/// record is dropped without a row and the log is marked interrupted; rows of
/// records that already finished are kept in processing order.
pub async fn run_records<S>(
  flow: &dyn SubmissionFlow,
  driver: &mut Driver,
  mut records: RecordSet,
  options: RunOptions<'_>,
  shutdown: S,
) -> RunLog
where
  S: Future<Output = ()>,
{
  flow.prepare(&mut records);
  let mut log = RunLog::new(flow.name(), flow.log_columns());
  let total = records.len();
  tokio::pin!(shutdown);

  for (done, record) in records.iter().enumerate() {
    let row = tokio::select! {
      biased;
      _ = &mut shutdown => None,
      row = run_workflow(flow, driver, record) => Some(row),
    };
    let Some(row) = row else {
      warn!(
        completed = done,
        total,
        record_id = %record.id(),
        "interrupted; in-flight record discarded"
      );
      log.interrupted = true;
      break;
    };
    info!(
      n = done + 1,
      total,
      record_id = %row.record_id,
      status = %row.status,
      "record logged"
    );
    log.append(row);
    if let Some(path) = options.progress
      && let Err(e) = write_progress(path, &log)
    {
      warn!(error = %e, "progress file not updated");
    }
  }
  log
}

/// Releases the surface, then writes `log` to `path`. The log is written even
/// when the release fails. Returns the number of rows written.
pub async fn finish_run(driver: Driver, log: RunLog, path: &Path) -> Result<usize, PortalError> {
  if let Err(e) = driver.release().await {
    warn!(error = %e, "surface release failed");
  }
  for (status, count) in log.tally() {
    info!(status = %status, count, "summary");
  }
  flush_csv(log, path)
}
