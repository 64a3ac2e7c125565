//! Invoice input sheet: one record per sheet row.
//!
//! A purchase order with several shipments appears once per shipment, each
//! row invoiced on its own. Record ids are therefore `<PO>@<sheet line>`; the
//! PO itself lives in [PO_FIELD].

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{info, instrument, warn};

use crate::dates::parse_page_date;
use crate::error::PortalError;
use crate::types::{FieldValue, Record, RecordSet};

/// Record field: purchase order searched for and logged.
pub const PO_FIELD: &str = "po_number";
/// Record field: date the goods shipped, matched against search results.
pub const INVOICE_DATE_FIELD: &str = "invoice_date";
pub const INVOICE_NUMBER_FIELD: &str = "invoice_number";
/// Expected total, as written in the sheet.
pub const AMOUNT_FIELD: &str = "amount";

/// Loads `PO, invoice date, invoice number, amount` rows (one header row).
///
/// Rows with an empty PO are skipped. An unreadable date is kept as text so
/// the record still reaches the run log.
#[instrument(level = "trace")]
pub fn load_invoices(path: &Path) -> Result<RecordSet, PortalError> {
  let mut reader = csv::ReaderBuilder::new()
    .has_headers(true)
    .flexible(true)
    .from_path(path)
    .map_err(|e| PortalError::csv(path, e))?;

  let mut out = RecordSet::new();
  for (line, row) in reader.records().enumerate() {
    let row = row.map_err(|e| PortalError::csv(path, e))?;
    let cell = |i: usize| row.get(i).map(str::trim).unwrap_or("");
    let sheet_line = line + 2;
    let po = cell(0);
    if po.is_empty() {
      warn!(line = sheet_line, "row without PO skipped");
      continue;
    }
    let mut fields = BTreeMap::new();
    fields.insert(PO_FIELD.to_string(), FieldValue::Text(po.to_string()));
    let date = match parse_page_date(cell(1)) {
      Some(d) => FieldValue::Date(d),
      None => FieldValue::Text(cell(1).to_string()),
    };
    fields.insert(INVOICE_DATE_FIELD.to_string(), date);
    fields.insert(
      INVOICE_NUMBER_FIELD.to_string(),
      FieldValue::Text(cell(2).to_string()),
    );
    fields.insert(AMOUNT_FIELD.to_string(), FieldValue::Text(cell(3).to_string()));
    out.insert(Record::new(format!("{po}@{sheet_line}"), fields));
  }
  info!(invoices = out.len(), "invoice sheet loaded");
  Ok(out)
}
