//! Drives the extractor across the pages of a result listing.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::extractor::{ExtractOptions, RowFilter, extract};
use crate::surface::{Driver, Target};
use crate::types::RecordSet;

/// Where the paginated listing lives on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationSpec {
  /// Logical table holding result rows.
  pub table: String,
  /// Logical "next page" control.
  pub next_control: String,
  /// Hard stop against listings that never run out of pages.
  pub max_pages: usize,
}

impl Default for PaginationSpec {
  fn default() -> Self {
    Self {
      table: "results".to_string(),
      next_control: "next_page".to_string(),
      max_pages: 500,
    }
  }
}

/// Extracts matching records from the current page and keeps paging while
/// the page just read contributed at least one match and a next control
/// exists.
///
/// Matching rows are assumed contiguous in the listing's order: the first
/// page without a match ends the scan. A page that fails to load ends the
/// scan as well; whatever was accumulated is returned.
#[instrument(level = "trace", skip_all, fields(table = %spec.table))]
pub async fn paginate(
  driver: &mut Driver,
  spec: &PaginationSpec,
  filter: &impl RowFilter,
  options: &ExtractOptions,
  mut acc: RecordSet,
) -> RecordSet {
  let next = Target::named(&spec.next_control);
  let mut page = 1;
  loop {
    let rows = match driver.rows(&spec.table).await {
      Ok(rows) => rows,
      Err(e) => {
        warn!(page, error = %e, "page did not load, ending pagination");
        break;
      }
    };
    let found = extract(&rows, filter, options);
    let matched = found.len();
    acc.merge(found);
    info!(page, matched, total = acc.len(), "page scanned");

    if matched == 0 {
      info!(page, "no matches on page, stopping");
      break;
    }
    if page >= spec.max_pages {
      warn!(page, "page limit reached");
      break;
    }
    match driver.is_present(&next).await {
      Ok(true) => {}
      Ok(false) => {
        info!(page, "no next page");
        break;
      }
      Err(e) => {
        warn!(page, error = %e, "next control check failed, ending pagination");
        break;
      }
    }
    if let Err(e) = driver.click(next.clone()).await {
      warn!(page, error = %e, "next page click failed, ending pagination");
      break;
    }
    driver.settle().await;
    page += 1;
  }
  acc
}
