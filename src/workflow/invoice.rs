//! Invoice creation: find the PO's shipment, check the total, submit.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{StepFlow, SubmissionFlow, columns, required_text};
use crate::dates::parse_page_date;
use crate::error::StepFailure;
use crate::invoice_source::{AMOUNT_FIELD, INVOICE_DATE_FIELD, INVOICE_NUMBER_FIELD, PO_FIELD};
use crate::reconcile::{parse_amount, reconcile_amount};
use crate::surface::{Driver, Target};
use crate::types::{Record, RunContext, WorkflowState};

/// Search results for one PO; each row exposes `shipped_date`.
pub const RESULTS_TABLE: &str = "po_results";
const SEARCH_MODE: &str = "search_mode";
const PO_NUMBER: &str = "po_number";
const SEARCH_SUBMIT: &str = "search_submit";
const SHIPMENT_CHECK: &str = "shipment_check";
const CREATE_INVOICE: &str = "create_invoice";
const TOTAL_AMOUNT: &str = "total_amount";
const INVOICE_NUMBER: &str = "invoice_number";
const AGREE: &str = "agree";
const SUBMIT_INVOICE: &str = "submit_invoice";
const CREATE_ANOTHER: &str = "create_another";

const CTX_TOTAL: &str = "total_amount";

/// Settings for [InvoiceFlow].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceSettings {
  /// Shipment search page; also the page returned to after a price error.
  pub search_url: String,
  /// Value put into the search-mode field before searching.
  pub search_mode: String,
  /// Input sheet (`PO, invoice date, invoice number, amount`).
  pub input: PathBuf,
}

impl Default for InvoiceSettings {
  fn default() -> Self {
    Self {
      search_url: String::new(),
      search_mode: "PURCHASE_ORDER".to_string(),
      input: "invoices.csv".into(),
    }
  }
}

/// Creates one invoice per input row.
pub struct InvoiceFlow {
  settings: InvoiceSettings,
}

impl InvoiceFlow {
  pub fn new(settings: InvoiceSettings) -> Self {
    Self { settings }
  }

  async fn search(&self, driver: &mut Driver, record: &Record) -> Result<StepFlow, StepFailure> {
    driver.navigate(&self.settings.search_url).await?;
    driver.settle().await;
    driver
      .fill(Target::named(SEARCH_MODE), self.settings.search_mode.as_str())
      .await?;
    let po = required_text(record, PO_FIELD)?;
    driver.wait_for(&Target::named(PO_NUMBER)).await?;
    driver.fill(Target::named(PO_NUMBER), po.as_str()).await?;
    driver.click(Target::named(SEARCH_SUBMIT)).await?;
    driver.settle().await;
    let rows = driver.rows(RESULTS_TABLE).await?;
    if rows.is_empty() {
      return Err(StepFailure::NotAvailable(format!("no shipments for PO {po}")));
    }
    debug!(po = %po, rows = rows.len(), "search results");
    Ok(StepFlow::Continue)
  }

  async fn select_shipment(
    &self,
    driver: &mut Driver,
    record: &Record,
  ) -> Result<StepFlow, StepFailure> {
    let shipped = record
      .date(INVOICE_DATE_FIELD)
      .ok_or_else(|| StepFailure::BadRecord(INVOICE_DATE_FIELD.to_string()))?;
    let rows = driver.rows(RESULTS_TABLE).await?;
    let row = rows
      .iter()
      .position(|r| r.get("shipped_date").and_then(parse_page_date) == Some(shipped))
      .ok_or_else(|| {
        StepFailure::NotAvailable(format!(
          "no shipment of PO {} shipped {}",
          self.log_id(record),
          shipped
        ))
      })?;
    driver.check(Target::nth(SHIPMENT_CHECK, row)).await?;
    driver.click(Target::named(CREATE_INVOICE)).await?;
    driver.settle().await;
    Ok(StepFlow::Continue)
  }

  async fn check_total(
    &self,
    driver: &mut Driver,
    record: &Record,
    ctx: &mut RunContext,
  ) -> Result<StepFlow, StepFailure> {
    let expected_raw = required_text(record, AMOUNT_FIELD)?;
    let expected =
      parse_amount(&expected_raw).map_err(|_| StepFailure::BadRecord(AMOUNT_FIELD.to_string()))?;
    driver.wait_for(&Target::named(TOTAL_AMOUNT)).await?;
    let raw = driver.read_text(Target::named(TOTAL_AMOUNT)).await?;
    ctx.insert(CTX_TOTAL.to_string(), raw.trim().to_string());
    let displayed = parse_amount(&raw)?;
    ctx.insert(CTX_TOTAL.to_string(), format!("{displayed:.2}"));
    reconcile_amount(displayed, expected)?;
    info!(po = %self.log_id(record), total = displayed, "invoice total matches");
    Ok(StepFlow::Continue)
  }
}

#[async_trait]
impl SubmissionFlow for InvoiceFlow {
  fn name(&self) -> &'static str {
    "invoice"
  }

  fn log_columns(&self) -> Vec<String> {
    columns(&["PO Number", "Invoice Number", "Invoice Amount", "Total Amount"])
  }

  fn uses(&self, state: WorkflowState) -> bool {
    matches!(
      state,
      WorkflowState::Start | WorkflowState::FillFields | WorkflowState::Submit
    )
  }

  fn fill_steps(&self) -> &'static [&'static str] {
    &["select_shipment", "check_total"]
  }

  async fn enter(
    &self,
    state: WorkflowState,
    driver: &mut Driver,
    record: &Record,
    _ctx: &mut RunContext,
  ) -> Result<StepFlow, StepFailure> {
    match state {
      WorkflowState::Start => self.search(driver, record).await,
      WorkflowState::Submit => {
        let number = required_text(record, INVOICE_NUMBER_FIELD)?;
        driver.fill(Target::named(INVOICE_NUMBER), number).await?;
        driver.check(Target::named(AGREE)).await?;
        driver.click(Target::named(SUBMIT_INVOICE)).await?;
        driver.settle().await;
        let again = Target::named(CREATE_ANOTHER);
        driver.wait_for(&again).await?;
        driver.click(again).await?;
        driver.settle().await;
        Ok(StepFlow::Continue)
      }
      _ => Ok(StepFlow::Continue),
    }
  }

  async fn fill(
    &self,
    step: &str,
    driver: &mut Driver,
    record: &Record,
    ctx: &mut RunContext,
  ) -> Result<StepFlow, StepFailure> {
    match step {
      "select_shipment" => self.select_shipment(driver, record).await,
      "check_total" => self.check_total(driver, record, ctx).await,
      _ => Ok(StepFlow::Continue),
    }
  }

  /// The PO, which repeats across rows of the same order.
  fn log_id(&self, record: &Record) -> String {
    record
      .text(PO_FIELD)
      .unwrap_or_else(|| record.id().to_string())
  }

  fn attributes(&self, record: &Record, ctx: &RunContext) -> Vec<String> {
    vec![
      record.text(INVOICE_NUMBER_FIELD).unwrap_or_default(),
      record.text(AMOUNT_FIELD).unwrap_or_default(),
      ctx.get(CTX_TOTAL).cloned().unwrap_or_default(),
    ]
  }

  fn recovery_url(&self) -> Option<&str> {
    Some(self.settings.search_url.as_str()).filter(|u| !u.is_empty())
  }
}
