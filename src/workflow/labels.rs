//! Label preparation: reconcile pack counts against master packs, then
//! confirm and print carton labels.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{LinkRewrite, StepFlow, SubmissionFlow, columns, detail_url, required_text};
use crate::error::StepFailure;
use crate::extractor::{LINK_FIELD, LOCATION_FIELD};
use crate::lookup::{LookupTable, MasterPack, TableSource, composite_key};
use crate::reconcile::reconcile_pack;
use crate::surface::{Driver, Target};
use crate::types::{OutcomeStatus, Record, RecordSet, RowSnapshot, RunContext, WorkflowState};

/// Item lines on the packing step: `asin`, `pack` (`"shipped / total"`),
/// `purchase_order`.
pub const PACK_TABLE: &str = "pack_lines";
const PACKING_METHOD: &str = "packing_method";
const UNITS_PER_CARTON: &str = "units_per_carton";
const CARTON_COUNT: &str = "carton_count";
const CONFIRM_ALL: &str = "confirm_all";
const CONFIRM_PRINT: &str = "confirm_print";

const CTX_PACKS: &str = "packs";

/// Settings for [LabelPrepFlow].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelSettings {
  pub detail_url: String,
  pub link_rewrites: Vec<LinkRewrite>,
  /// `item::warehouse` → purchase order and master pack.
  pub master_pack: TableSource,
}

impl Default for LabelSettings {
  fn default() -> Self {
    Self {
      detail_url: "{link}".to_string(),
      link_rewrites: Vec::new(),
      master_pack: TableSource {
        path: "shipment_details.csv".into(),
        header_rows: 7,
        key_columns: vec![2, 0],
        value_columns: vec![3, 12],
        first_token: true,
      },
    }
  }
}

/// Prepares carton labels for each shipment of a pickup day.
pub struct LabelPrepFlow {
  settings: LabelSettings,
  packs: LookupTable<MasterPack>,
  home_url: Option<String>,
}

/// Total units of a pack line, from `"shipped / total"` (or a bare number).
fn pack_total(text: &str) -> Option<u32> {
  text.rsplit('/').next()?.trim().parse().ok()
}

fn line_field<'a>(line: &'a RowSnapshot, field: &str) -> Result<&'a str, StepFailure> {
  line
    .get(field)
    .ok_or_else(|| StepFailure::BadRecord(format!("{PACK_TABLE}.{field}")))
}

impl LabelPrepFlow {
  /// `home_url` is where the flow returns after an indivisible pack.
  pub fn new(
    settings: LabelSettings,
    packs: LookupTable<MasterPack>,
    home_url: Option<String>,
  ) -> Self {
    Self {
      settings,
      packs,
      home_url,
    }
  }

  fn url(&self, record: &Record) -> Result<String, StepFailure> {
    detail_url(&self.settings.detail_url, &self.settings.link_rewrites, record)
  }

  async fn reconcile_lines(
    &self,
    driver: &mut Driver,
    record: &Record,
    ctx: &mut RunContext,
  ) -> Result<StepFlow, StepFailure> {
    let lines = driver.rows(PACK_TABLE).await?;
    ctx.insert(CTX_PACKS.to_string(), lines.len().to_string());
    if lines.is_empty() {
      info!(record_id = %record.id(), "no pack lines left");
      return Ok(StepFlow::Finish(OutcomeStatus::AlreadyCompleted));
    }
    let location = required_text(record, LOCATION_FIELD)?;
    let warehouse = location.split_whitespace().next().unwrap_or(&location);

    for (i, line) in lines.iter().enumerate() {
      let item = line_field(line, "asin")?;
      let raw_pack = line_field(line, "pack")?;
      let pack = pack_total(raw_pack)
        .ok_or_else(|| StepFailure::BadRecord(format!("{PACK_TABLE}.pack '{raw_pack}'")))?;
      let po = line_field(line, "purchase_order")?;

      let key = composite_key(&[item, warehouse]);
      let master = self.packs.require(&key)?;
      if master.purchase_order != po {
        return Err(StepFailure::LookupMiss {
          table: "master pack".to_string(),
          key: format!("{key} (PO {po}, sheet has {})", master.purchase_order),
        });
      }
      let split = reconcile_pack(pack, master.pack)?;
      driver
        .fill(
          Target::nth(UNITS_PER_CARTON, i),
          split.units_per_carton.to_string(),
        )
        .await?;
      driver
        .fill(Target::nth(CARTON_COUNT, i), split.carton_count.to_string())
        .await?;
      debug!(
        item,
        pack,
        master_pack = master.pack,
        units_per_carton = split.units_per_carton,
        cartons = split.carton_count,
        "pack line filled"
      );
    }
    Ok(StepFlow::Continue)
  }
}

#[async_trait]
impl SubmissionFlow for LabelPrepFlow {
  fn name(&self) -> &'static str {
    "labels"
  }

  fn log_columns(&self) -> Vec<String> {
    columns(&["ARN", "Warehouse", "Link", "Packs"])
  }

  fn uses(&self, state: WorkflowState) -> bool {
    matches!(
      state,
      WorkflowState::Start
        | WorkflowState::Step2
        | WorkflowState::FillFields
        | WorkflowState::Submit
    )
  }

  fn fill_steps(&self) -> &'static [&'static str] {
    &["packing_method", "pack_lines"]
  }

  async fn enter(
    &self,
    state: WorkflowState,
    driver: &mut Driver,
    record: &Record,
    _ctx: &mut RunContext,
  ) -> Result<StepFlow, StepFailure> {
    match state {
      WorkflowState::Start => {
        let url = self.url(record)?;
        driver.navigate(&url).await?;
        driver.settle().await;
      }
      WorkflowState::Submit => {
        driver.wait_for(&Target::named(CONFIRM_ALL)).await?;
        driver.click(Target::named(CONFIRM_ALL)).await?;
        driver.wait_for(&Target::named(CONFIRM_PRINT)).await?;
        driver.click(Target::named(CONFIRM_PRINT)).await?;
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
    record: &Record,
    ctx: &mut RunContext,
  ) -> Result<StepFlow, StepFailure> {
    match step {
      "packing_method" => {
        driver.wait_for(&Target::named(PACKING_METHOD)).await?;
        driver.check(Target::nth(PACKING_METHOD, 0)).await?;
        Ok(StepFlow::Continue)
      }
      "pack_lines" => self.reconcile_lines(driver, record, ctx).await,
      _ => Ok(StepFlow::Continue),
    }
  }

  fn attributes(&self, record: &Record, ctx: &RunContext) -> Vec<String> {
    let link = self
      .url(record)
      .ok()
      .or_else(|| record.text(LINK_FIELD))
      .unwrap_or_default();
    vec![
      record.text(LOCATION_FIELD).unwrap_or_default(),
      link,
      ctx.get(CTX_PACKS).cloned().unwrap_or_else(|| "0".to_string()),
    ]
  }

  fn recovery_url(&self) -> Option<&str> {
    self.home_url.as_deref()
  }

  /// Warehouse order keeps consecutive shipments on the same master-pack rows.
  fn prepare(&self, records: &mut RecordSet) {
    records.sort_by_field(LOCATION_FIELD);
  }
}
