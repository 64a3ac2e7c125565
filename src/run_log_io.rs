//! Run log persistence: the final CSV table and the optional progress file.

use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::error::PortalError;
use crate::types::RunLog;

/// Suffix of the progress file written next to the log.
pub const PROGRESS_SUFFIX: &str = ".progress.json";

/// `<log path>.progress.json`.
pub fn progress_path(log_path: &Path) -> PathBuf {
  let mut name = log_path.as_os_str().to_owned();
  name.push(PROGRESS_SUFFIX);
  PathBuf::from(name)
}

/// Writes the log as a flat table: header, then one line per outcome row.
///
/// Takes the log by value: a run log is flushed exactly once. Returns the
/// number of rows written.
#[instrument(level = "trace", skip(log), fields(rows = log.len()))]
pub fn flush_csv(log: RunLog, path: &Path) -> Result<usize, PortalError> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent).map_err(|e| PortalError::io(parent, e))?;
  }
  let mut writer = csv::Writer::from_path(path).map_err(|e| PortalError::csv(path, e))?;
  writer
    .write_record(&log.columns)
    .map_err(|e| PortalError::csv(path, e))?;
  for row in log.rows() {
    writer
      .write_record(row.cells())
      .map_err(|e| PortalError::csv(path, e))?;
  }
  writer.flush().map_err(|e| PortalError::io(path, e))?;
  info!(path = %path.display(), rows = log.len(), interrupted = log.interrupted, "run log written");
  Ok(log.len())
}

/// Rewrites the progress file with every row appended so far.
pub fn write_progress(path: &Path, log: &RunLog) -> Result<(), PortalError> {
  let json = serde_json::to_string_pretty(log)?;
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent).map_err(|e| PortalError::io(parent, e))?;
  }
  std::fs::write(path, json).map_err(|e| PortalError::io(path, e))
}

/// Loads a progress file written by [write_progress].
pub fn load_progress(path: &Path) -> Result<RunLog, PortalError> {
  let bytes = std::fs::read(path).map_err(|e| PortalError::io(path, e))?;
  Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
  use std::path::Path;

  use super::{flush_csv, load_progress, progress_path, write_progress};
  use crate::error::PortalError;
  use crate::types::{OutcomeRow, OutcomeStatus, RunLog};

  fn log() -> RunLog {
    let mut log = RunLog::new(
      "shipment",
      vec![
        "ARN".into(),
        "Warehouse".into(),
        "Link".into(),
        "Status".into(),
      ],
    );
    log.append(OutcomeRow::new(
      "A1",
      vec!["ONT8".into(), "https://p/1".into()],
      OutcomeStatus::Submitted,
    ));
    log.append(OutcomeRow::new(
      "A2",
      vec!["ZZZ9".into(), "https://p/2".into()],
      OutcomeStatus::WarehouseNotFound,
    ));
    log
  }

  #[test]
  fn csv_has_header_and_rows_in_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("logs/shipment.csv");
    let written = flush_csv(log(), &path).expect("flush");
    assert_eq!(written, 2);
    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
      lines,
      vec![
        "ARN,Warehouse,Link,Status",
        "A1,ONT8,https://p/1,Submitted",
        "A2,ZZZ9,https://p/2,Warehouse Not Found",
      ]
    );
  }

  #[test]
  fn progress_roundtrips_through_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = progress_path(&dir.path().join("run.csv"));
    assert!(path.to_string_lossy().ends_with("run.csv.progress.json"));
    let mut log = log();
    log.interrupted = true;
    write_progress(&path, &log).expect("write");
    let loaded = load_progress(&path).expect("load");
    assert_eq!(loaded.run_id, log.run_id);
    assert!(loaded.interrupted);
    assert_eq!(loaded.rows(), log.rows());
  }

  #[test]
  fn missing_progress_is_an_io_error() {
    let err = load_progress(Path::new("/nonexistent/run.progress.json")).unwrap_err();
    assert!(matches!(err, PortalError::Io { .. }));
  }
}
