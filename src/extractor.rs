//! Record extraction from one page of result rows.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, info, instrument};

use crate::dates::format_listing_date;
use crate::types::{FieldValue, Record, RecordSet, RowSnapshot};

/// Logical row field holding the record identifier.
pub const ID_FIELD: &str = "id";
/// Logical row field holding the date text (e.g. `Pickup: Fri, Mar 7, 2025`).
pub const DATE_FIELD: &str = "date";
/// Logical row field holding `ship-to, city, ...` location text.
pub const LOCATION_FIELD: &str = "location";
/// Logical row field holding the detail link (absolute or site-relative).
pub const LINK_FIELD: &str = "link";

/// Decides whether a row becomes a record.
pub trait RowFilter {
  fn accepts(&self, row: &RowSnapshot) -> bool;
}

impl<F> RowFilter for F
where
  F: Fn(&RowSnapshot) -> bool,
{
  fn accepts(&self, row: &RowSnapshot) -> bool {
    self(row)
  }
}

/// Accepts rows whose date field contains the target date in listing format
/// (`Mon D, YYYY`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFilter {
  needle: String,
}

impl DateFilter {
  pub fn for_date(date: NaiveDate) -> Self {
    Self {
      needle: format_listing_date(date),
    }
  }

  pub fn needle(&self) -> &str {
    &self.needle
  }
}

impl RowFilter for DateFilter {
  fn accepts(&self, row: &RowSnapshot) -> bool {
    row
      .get(DATE_FIELD)
      .is_some_and(|text| text.contains(&self.needle))
  }
}

/// Options applied to every extracted record.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
  /// Prefix for site-relative links (`/shipments/1` → `<base>/shipments/1`).
  pub link_base: Option<String>,
}

impl ExtractOptions {
  fn absolute_link(&self, link: &str) -> String {
    match &self.link_base {
      Some(base) if link.starts_with('/') => format!("{}{}", base.trim_end_matches('/'), link),
      _ => link.to_string(),
    }
  }
}

/// First segment of a `code, city, state` location.
fn location_code(text: &str) -> &str {
  text.split(',').next().unwrap_or(text).trim()
}

/// Builds records from the rows `filter` accepts. Rows without an id or a
/// date are skipped. Zero rows yields an empty set.
#[instrument(level = "trace", skip(rows, filter, options), fields(rows = rows.len()))]
pub fn extract(
  rows: &[RowSnapshot],
  filter: &impl RowFilter,
  options: &ExtractOptions,
) -> RecordSet {
  let mut out = RecordSet::new();
  for row in rows {
    let (Some(id), Some(date)) = (row.get(ID_FIELD), row.get(DATE_FIELD)) else {
      debug!("row without id or date skipped");
      continue;
    };
    if !filter.accepts(row) {
      continue;
    }
    let mut fields = BTreeMap::new();
    fields.insert(DATE_FIELD.to_string(), FieldValue::Text(date.to_string()));
    if let Some(location) = row.get(LOCATION_FIELD) {
      fields.insert(
        LOCATION_FIELD.to_string(),
        FieldValue::Text(location_code(location).to_string()),
      );
    }
    if let Some(link) = row.get(LINK_FIELD) {
      fields.insert(
        LINK_FIELD.to_string(),
        FieldValue::Link(options.absolute_link(link)),
      );
    }
    out.insert(Record::new(id, fields));
  }
  info!(rows = rows.len(), matched = out.len(), "page extracted");
  out
}
