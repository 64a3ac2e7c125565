//! Tests for `InvoiceFlow`.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::{InvoiceFlow, InvoiceSettings, SubmissionFlow, run_workflow};
use crate::invoice_source::{AMOUNT_FIELD, INVOICE_DATE_FIELD, INVOICE_NUMBER_FIELD, PO_FIELD};
use crate::surface::replay::{ReplayPage, ReplayScript};
use crate::surface::{Action, Target};
use crate::test_support::{clicked, repeated, replay_driver};
use crate::types::{FieldValue, OutcomeStatus, Record, RowSnapshot};

const SEARCH: &str = "https://portal/invoices/search";

fn invoice(po: &str, shipped: (i32, u32, u32), amount: &str) -> Record {
  sheet_row(po, 2, shipped, amount)
}

/// Invoice record as the sheet loader builds it for `line`.
fn sheet_row(po: &str, line: usize, shipped: (i32, u32, u32), amount: &str) -> Record {
  let mut fields = BTreeMap::new();
  fields.insert(PO_FIELD.to_string(), FieldValue::Text(po.to_string()));
  fields.insert(
    INVOICE_DATE_FIELD.to_string(),
    FieldValue::Date(NaiveDate::from_ymd_opt(shipped.0, shipped.1, shipped.2).unwrap()),
  );
  fields.insert(
    INVOICE_NUMBER_FIELD.to_string(),
    FieldValue::Text(format!("INV-{po}")),
  );
  fields.insert(AMOUNT_FIELD.to_string(), FieldValue::Text(amount.to_string()));
  Record::new(format!("{po}@{line}"), fields)
}

/// Search page, a result page for PO1 with two shipments, and its invoice
/// page showing `total`.
fn portal(total: &str) -> ReplayScript {
  let mut script = ReplayScript::default();

  let mut search = ReplayPage {
    controls: vec!["search_mode".into(), "po_number".into(), "search_submit".into()],
    ..Default::default()
  };
  search.on_click.insert(
    "search_submit".into(),
    "https://portal/invoices/results/{po_number}".into(),
  );
  script.pages.insert(SEARCH.into(), search);

  let mut results = ReplayPage {
    controls: repeated("shipment_check", 2),
    ..Default::default()
  };
  results.controls.push("create_invoice".into());
  results.tables.insert(
    "po_results".into(),
    vec![
      RowSnapshot::new().with("shipped_date", "03/06/2025"),
      RowSnapshot::new().with("shipped_date", "3/7/2025"),
    ],
  );
  results.on_click.insert(
    "create_invoice".into(),
    "https://portal/invoices/new/{po_number}".into(),
  );
  script
    .pages
    .insert("https://portal/invoices/results/PO1".into(), results);

  let mut form = ReplayPage {
    controls: vec![
      "invoice_number".into(),
      "agree".into(),
      "submit_invoice".into(),
      "create_another".into(),
    ],
    ..Default::default()
  };
  form.texts.insert("total_amount".into(), total.into());
  form.on_click.insert("create_another".into(), SEARCH.into());
  script
    .pages
    .insert("https://portal/invoices/new/PO1".into(), form);
  script
}

fn flow() -> InvoiceFlow {
  InvoiceFlow::new(InvoiceSettings {
    search_url: SEARCH.into(),
    ..Default::default()
  })
}

#[tokio::test]
async fn matching_total_submits_invoice() {
  let (mut driver, probe) = replay_driver(portal("$1,100.00"));
  let row = run_workflow(&flow(), &mut driver, &invoice("PO1", (2025, 3, 7), "1100")).await;

  assert_eq!(row.status, OutcomeStatus::Submitted);
  assert_eq!(row.record_id, "PO1");
  assert_eq!(row.attributes, vec!["INV-PO1", "1100", "1100.00"]);
  assert_eq!(
    probe.filled(&Target::named("po_number")).as_deref(),
    Some("PO1")
  );
  assert!(probe.actions().contains(&Action::Check {
    target: Target::nth("shipment_check", 1)
  }));
  assert_eq!(
    probe.filled(&Target::named("search_mode")).as_deref(),
    Some("PURCHASE_ORDER")
  );
  assert_eq!(
    probe.filled(&Target::named("invoice_number")).as_deref(),
    Some("INV-PO1")
  );
  assert_eq!(
    clicked(&probe),
    vec!["search_submit", "create_invoice", "submit_invoice", "create_another"]
  );
  assert_eq!(probe.visited().last().map(String::as_str), Some(SEARCH));
}

#[tokio::test]
async fn each_shipment_of_a_po_gets_its_own_invoice() {
  let (mut driver, probe) = replay_driver(portal("$100.00"));
  let first = sheet_row("PO1", 2, (2025, 3, 6), "100.00");
  let second = sheet_row("PO1", 3, (2025, 3, 7), "100.00");

  let rows = [
    run_workflow(&flow(), &mut driver, &first).await,
    run_workflow(&flow(), &mut driver, &second).await,
  ];

  for row in &rows {
    assert_eq!(row.status, OutcomeStatus::Submitted);
    assert_eq!(row.record_id, "PO1");
  }
  let checked: Vec<Target> = probe
    .actions()
    .into_iter()
    .filter_map(|a| match a {
      Action::Check { target } if target.name == "shipment_check" => Some(target),
      _ => None,
    })
    .collect();
  assert_eq!(
    checked,
    vec![Target::nth("shipment_check", 0), Target::nth("shipment_check", 1)]
  );
}

#[tokio::test]
async fn total_within_a_cent_is_accepted() {
  let (mut driver, _probe) = replay_driver(portal("100.004"));
  let row = run_workflow(&flow(), &mut driver, &invoice("PO1", (2025, 3, 7), "100.00")).await;
  assert_eq!(row.status, OutcomeStatus::Submitted);
}

#[tokio::test]
async fn price_mismatch_recovers_to_search() {
  let (mut driver, probe) = replay_driver(portal("$100.02"));
  let row = run_workflow(&flow(), &mut driver, &invoice("PO1", (2025, 3, 7), "100.00")).await;

  assert_eq!(row.status, OutcomeStatus::PriceError);
  assert_eq!(row.attributes[2], "100.02");
  assert!(!clicked(&probe).contains(&"submit_invoice".to_string()));
  assert_eq!(probe.visited().last().map(String::as_str), Some(SEARCH));
}

#[tokio::test]
async fn unreadable_total_is_invalid_amount() {
  let (mut driver, _probe) = replay_driver(portal("pending"));
  let row = run_workflow(&flow(), &mut driver, &invoice("PO1", (2025, 3, 7), "100.00")).await;
  assert_eq!(row.status, OutcomeStatus::InvalidAmount);
  assert_eq!(row.attributes[2], "pending");
}

#[tokio::test]
async fn po_without_results_is_not_available() {
  let (mut driver, probe) = replay_driver(portal("$1.00"));
  let row = run_workflow(&flow(), &mut driver, &invoice("PO2", (2025, 3, 7), "1.00")).await;
  assert_eq!(row.status, OutcomeStatus::NotAvailable);
  assert_eq!(row.attributes[2], "");
  assert_eq!(clicked(&probe), vec!["search_submit"]);
}

#[tokio::test]
async fn unmatched_ship_date_is_not_available() {
  let (mut driver, probe) = replay_driver(portal("$1.00"));
  let row = run_workflow(&flow(), &mut driver, &invoice("PO1", (2025, 3, 10), "1.00")).await;
  assert_eq!(row.status, OutcomeStatus::NotAvailable);
  assert!(!clicked(&probe).contains(&"create_invoice".to_string()));
}

#[test]
fn log_header_matches_invoice_sheet() {
  assert_eq!(
    flow().log_columns(),
    vec![
      "PO Number",
      "Invoice Number",
      "Invoice Amount",
      "Total Amount",
      "Status"
    ]
  );
}
