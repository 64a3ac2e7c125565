//! Shipment confirmation: tracking numbers, ship and arrival dates, submit.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{LinkRewrite, StepFlow, SubmissionFlow, columns, detail_url, required_text};
use crate::dates::{compute_arrival, format_form_date};
use crate::error::{StepFailure, SurfaceError};
use crate::extractor::{LINK_FIELD, LOCATION_FIELD};
use crate::lookup::{LookupTable, TableSource, TransitDays};
use crate::surface::{Driver, Target};
use crate::types::{Record, RunContext, WorkflowState};

/// Carton rows on the tracking step; each exposes a `label` field.
pub const CARTON_TABLE: &str = "cartons";
const LABEL_FIELD: &str = "label";
const TRACKING_CELL: &str = "tracking_cell";
const TRACKING_OPTION: &str = "tracking_option";
const SHIP_DATE: &str = "ship_date";
const ARRIVAL_DATE: &str = "arrival_date";
const CONFIRM_SUBMIT: &str = "confirm_submit";

const CTX_TRANSIT: &str = "transit_days";
const CTX_ARRIVAL: &str = "arrival_date";
const CTX_TRACKED: &str = "tracking_filled";
const CTX_SKIPPED: &str = "tracking_skipped";

/// Settings for [ShipmentFlow].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipmentSettings {
  /// Submission page of a record. Placeholders: `{id}`, `{link}`, any field.
  pub detail_url: String,
  pub link_rewrites: Vec<LinkRewrite>,
  /// Only carton labels starting with this prefix get a tracking number.
  pub carton_label_prefix: String,
  /// Warehouse → business days in transit.
  pub transit_days: TableSource,
}

impl Default for ShipmentSettings {
  fn default() -> Self {
    Self {
      detail_url: "{link}".to_string(),
      link_rewrites: Vec::new(),
      carton_label_prefix: "AMZN".to_string(),
      transit_days: TableSource {
        path: "warehouse_transit.csv".into(),
        header_rows: 1,
        key_columns: vec![0],
        value_columns: vec![2],
        first_token: false,
      },
    }
  }
}

/// Confirms one shipment per record, dated for a single pickup day.
pub struct ShipmentFlow {
  settings: ShipmentSettings,
  transit: LookupTable<TransitDays>,
  ship_date: NaiveDate,
}

impl ShipmentFlow {
  pub fn new(
    settings: ShipmentSettings,
    transit: LookupTable<TransitDays>,
    ship_date: NaiveDate,
  ) -> Self {
    Self {
      settings,
      transit,
      ship_date,
    }
  }

  fn url(&self, record: &Record) -> Result<String, StepFailure> {
    detail_url(&self.settings.detail_url, &self.settings.link_rewrites, record)
  }

  /// Pairs the k-th prefixed carton label with the k-th tracking option.
  ///
  /// A carton row whose cell or dropdown misbehaves is skipped and counted;
  /// the remaining rows keep their positional pairing.
  async fn fill_tracking(
    &self,
    driver: &mut Driver,
    ctx: &mut RunContext,
  ) -> Result<StepFlow, StepFailure> {
    let cartons = driver.rows(CARTON_TABLE).await?;
    if cartons.is_empty() {
      warn!("no carton rows on tracking step");
    }
    let prefix = self.settings.carton_label_prefix.as_str();
    let mut slot = 0;
    let mut filled = 0;
    let mut skipped = 0;
    for (row, carton) in cartons.iter().enumerate() {
      if !carton.get(LABEL_FIELD).is_some_and(|l| l.starts_with(prefix)) {
        continue;
      }
      let picked = pick_tracking(driver, row, slot).await;
      slot += 1;
      match picked {
        Ok(tracking) if tracking.trim().is_empty() => {
          warn!(row, "empty tracking option, row left blank");
        }
        Ok(tracking) => {
          debug!(row, tracking = %tracking, "tracking number set");
          filled += 1;
        }
        Err(e) => {
          warn!(row, error = %e, "carton row skipped");
          skipped += 1;
        }
      }
    }
    ctx.insert(CTX_TRACKED.to_string(), filled.to_string());
    ctx.insert(CTX_SKIPPED.to_string(), skipped.to_string());
    info!(cartons = cartons.len(), filled, skipped, "tracking numbers filled");
    Ok(StepFlow::Continue)
  }
}

/// Opens the tracking cell of carton `row` and picks option `slot`.
async fn pick_tracking(
  driver: &mut Driver,
  row: usize,
  slot: usize,
) -> Result<String, SurfaceError> {
  driver.double_click(Target::nth(TRACKING_CELL, row)).await?;
  driver.wait_for(&Target::named(TRACKING_OPTION)).await?;
  driver.select_option(Target::named(TRACKING_OPTION), slot).await
}

#[async_trait]
impl SubmissionFlow for ShipmentFlow {
  fn name(&self) -> &'static str {
    "shipment"
  }

  fn log_columns(&self) -> Vec<String> {
    columns(&["ARN", "Warehouse", "Link"])
  }

  fn uses(&self, state: WorkflowState) -> bool {
    !state.is_terminal()
  }

  fn fill_steps(&self) -> &'static [&'static str] {
    &["tracking_numbers"]
  }

  async fn enter(
    &self,
    state: WorkflowState,
    driver: &mut Driver,
    record: &Record,
    ctx: &mut RunContext,
  ) -> Result<StepFlow, StepFailure> {
    match state {
      WorkflowState::Start => {
        let warehouse = required_text(record, LOCATION_FIELD)?;
        let TransitDays(days) = *self.transit.require(&warehouse)?;
        let arrival = compute_arrival(self.ship_date, days)?;
        ctx.insert(CTX_TRANSIT.to_string(), days.to_string());
        ctx.insert(CTX_ARRIVAL.to_string(), format_form_date(arrival));
        let url = self.url(record)?;
        driver.navigate(&url).await?;
        driver.settle().await;
        info!(
          record_id = %record.id(),
          warehouse = %warehouse,
          transit_days = days,
          arrival = %arrival,
          "submission page opened"
        );
      }
      WorkflowState::Submit => {
        let arrival = ctx
          .get(CTX_ARRIVAL)
          .cloned()
          .ok_or_else(|| StepFailure::BadRecord(CTX_ARRIVAL.to_string()))?;
        driver.wait_for(&Target::named(SHIP_DATE)).await?;
        driver
          .fill(Target::named(SHIP_DATE), format_form_date(self.ship_date))
          .await?;
        driver.fill(Target::named(ARRIVAL_DATE), arrival).await?;
        driver.click(Target::named(CONFIRM_SUBMIT)).await?;
        driver.settle().await;
      }
      _ => {}
    }
    Ok(StepFlow::Continue)
  }

  async fn fill(
    &self,
    step: &str,
    driver: &mut Driver,
    _record: &Record,
    ctx: &mut RunContext,
  ) -> Result<StepFlow, StepFailure> {
    match step {
      "tracking_numbers" => self.fill_tracking(driver, ctx).await,
      _ => Ok(StepFlow::Continue),
    }
  }

  fn attributes(&self, record: &Record, _ctx: &RunContext) -> Vec<String> {
    let link = self
      .url(record)
      .ok()
      .or_else(|| record.text(LINK_FIELD))
      .unwrap_or_default();
    vec![record.text(LOCATION_FIELD).unwrap_or_default(), link]
  }
}
