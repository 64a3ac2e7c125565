//! Auxiliary lookup tables loaded from CSV (warehouse → transit days,
//! item + warehouse → master pack).

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{PortalError, StepFailure};

/// Separator between the parts of a composite key.
pub const KEY_SEPARATOR: &str = "::";

/// Where a lookup table lives and which columns it uses (0-based).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSource {
  pub path: PathBuf,
  /// Leading rows to skip (headers, banners).
  #[serde(default)]
  pub header_rows: usize,
  pub key_columns: Vec<usize>,
  pub value_columns: Vec<usize>,
  /// Keep only the first whitespace-separated token of each key cell
  /// (`"ONT8 - Moreno Valley"` → `"ONT8"`).
  #[serde(default)]
  pub first_token: bool,
}

/// Joins key parts into one lookup key.
pub fn composite_key(parts: &[&str]) -> String {
  parts.join(KEY_SEPARATOR)
}

/// A value type that can be built from the value columns of one row.
pub trait FromColumns: Sized {
  /// Name used in logs and lookup-miss reports.
  const TABLE: &'static str;

  fn from_columns(cells: &[&str]) -> Result<Self, String>;
}

/// Business days in transit for a warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitDays(pub i64);

impl FromColumns for TransitDays {
  const TABLE: &'static str = "transit days";

  fn from_columns(cells: &[&str]) -> Result<Self, String> {
    let cell = cells.first().ok_or("missing transit column")?;
    parse_whole(cell)
      .map(TransitDays)
      .ok_or_else(|| format!("'{cell}' is not a whole number"))
  }
}

/// Purchase order and master-pack size for an item at a warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterPack {
  pub purchase_order: String,
  pub pack: u32,
}

impl FromColumns for MasterPack {
  const TABLE: &'static str = "master pack";

  fn from_columns(cells: &[&str]) -> Result<Self, String> {
    let [po, pack, ..] = cells else {
      return Err("expected purchase order and pack columns".to_string());
    };
    let pack = parse_whole(pack)
      .and_then(|n| u32::try_from(n).ok())
      .ok_or_else(|| format!("'{pack}' is not a pack size"))?;
    Ok(MasterPack {
      purchase_order: po.to_string(),
      pack,
    })
  }
}

/// Parses `12`, `12.0` or `-3`; spreadsheets export whole numbers as floats.
fn parse_whole(cell: &str) -> Option<i64> {
  let cell = cell.trim();
  if let Ok(n) = cell.parse::<i64>() {
    return Some(n);
  }
  let f = cell.parse::<f64>().ok()?;
  (f.fract() == 0.0 && f.is_finite()).then_some(f as i64)
}

/// Read-only keyed table. A miss is always reported, never defaulted.
#[derive(Debug, Clone)]
pub struct LookupTable<V> {
  entries: HashMap<String, V>,
}

impl<V: FromColumns> LookupTable<V> {
  pub fn from_entries(entries: impl IntoIterator<Item = (String, V)>) -> Self {
    Self {
      entries: entries.into_iter().collect(),
    }
  }

  pub fn get(&self, key: &str) -> Option<&V> {
    self.entries.get(key)
  }

  /// Like [LookupTable::get] but turns a miss into a record-scoped failure.
  pub fn require(&self, key: &str) -> Result<&V, StepFailure> {
    self.get(key).ok_or_else(|| StepFailure::LookupMiss {
      table: V::TABLE.to_string(),
      key: key.to_string(),
    })
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Loads the table described by `source`.
  ///
  /// The first row with an empty key or value cell ends the table; populated
  /// rows after it are ignored and reported with a warning.
  #[instrument(level = "trace", fields(path = %source.path.display()))]
  pub fn load(source: &TableSource) -> Result<Self, PortalError> {
    let mut reader = csv::ReaderBuilder::new()
      .has_headers(false)
      .flexible(true)
      .from_path(&source.path)
      .map_err(|e| PortalError::csv(&source.path, e))?;

    let mut entries = HashMap::new();
    let mut records = reader.records().skip(source.header_rows);
    let mut line = source.header_rows;
    while let Some(record) = records.next() {
      let record = record.map_err(|e| PortalError::csv(&source.path, e))?;
      line += 1;
      let cell = |i: usize| record.get(i).map(str::trim).unwrap_or("");

      let keys: Vec<&str> = source
        .key_columns
        .iter()
        .map(|&i| {
          let c = cell(i);
          if source.first_token {
            c.split_whitespace().next().unwrap_or("")
          } else {
            c
          }
        })
        .collect();
      let values: Vec<&str> = source.value_columns.iter().map(|&i| cell(i)).collect();

      if keys.iter().chain(values.iter()).any(|c| c.is_empty()) {
        let ignored = records
          .by_ref()
          .filter_map(Result::ok)
          .filter(|r| {
            source
              .key_columns
              .iter()
              .any(|&i| r.get(i).is_some_and(|c| !c.trim().is_empty()))
          })
          .count();
        if ignored > 0 {
          warn!(
            table = V::TABLE,
            line,
            ignored,
            "blank row ends the table; populated rows after it are ignored"
          );
        }
        break;
      }

      match V::from_columns(&values) {
        Ok(value) => {
          let key = composite_key(&keys);
          if entries.insert(key.clone(), value).is_some() {
            debug!(table = V::TABLE, key = %key, "duplicate key, last row wins");
          }
        }
        Err(reason) => warn!(table = V::TABLE, line, reason = %reason, "row skipped"),
      }
    }
    info!(table = V::TABLE, entries = entries.len(), "lookup table loaded");
    Ok(Self { entries })
  }
}
