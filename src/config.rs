//! Run configuration: one JSON file, every field defaulted, environment on top.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::PortalError;
use crate::paginator::PaginationSpec;
use crate::surface::Timeouts;
use crate::surface::selectors::SelectorMap;
use crate::workflow::{InvoiceSettings, LabelSettings, PrintSettings, ShipmentSettings};

/// Overrides [PortalConfig::cdp_endpoint].
pub const ENV_CDP_ENDPOINT: &str = "PORTAL_CDP_ENDPOINT";
/// Overrides [PortalConfig::log_dir].
pub const ENV_LOG_DIR: &str = "PORTAL_LOG_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
  /// Remote-debugging endpoint of the running browser.
  pub cdp_endpoint: String,
  /// Listing the listing-driven flows start from.
  pub start_url: String,
  /// Prefix for site-relative detail links.
  pub link_base: Option<String>,
  /// Where run logs go when `--log` is not given.
  pub log_dir: PathBuf,
  pub timeouts: Timeouts,
  pub pagination: PaginationSpec,
  pub selectors: SelectorMap,
  pub shipment: ShipmentSettings,
  pub labels: LabelSettings,
  pub print: PrintSettings,
  pub invoice: InvoiceSettings,
}

impl Default for PortalConfig {
  fn default() -> Self {
    Self {
      cdp_endpoint: "http://localhost:9222".to_string(),
      start_url: String::new(),
      link_base: None,
      log_dir: PathBuf::from("."),
      timeouts: Timeouts::default(),
      pagination: PaginationSpec::default(),
      selectors: SelectorMap::default(),
      shipment: ShipmentSettings::default(),
      labels: LabelSettings::default(),
      print: PrintSettings::default(),
      invoice: InvoiceSettings::default(),
    }
  }
}

impl PortalConfig {
  /// Reads a config file. Missing fields take their defaults.
  #[instrument(level = "trace")]
  pub fn load(path: &Path) -> Result<Self, PortalError> {
    let text = std::fs::read_to_string(path).map_err(|e| PortalError::io(path, e))?;
    Self::from_json(&text)
  }

  pub fn from_json(text: &str) -> Result<Self, PortalError> {
    serde_json::from_str(text).map_err(|e| PortalError::Config(e.to_string()))
  }

  /// Applies environment overrides read through `var`.
  pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
    if let Some(endpoint) = var(ENV_CDP_ENDPOINT).filter(|v| !v.trim().is_empty()) {
      self.cdp_endpoint = endpoint;
    }
    if let Some(dir) = var(ENV_LOG_DIR).filter(|v| !v.trim().is_empty()) {
      self.log_dir = PathBuf::from(dir);
    }
  }

  /// Listing-driven flows need somewhere to start.
  pub fn require_start_url(&self) -> Result<&str, PortalError> {
    match self.start_url.trim() {
      "" => Err(PortalError::Config("start_url is not set".to_string())),
      url => Ok(url),
    }
  }

  /// Fresh log file name for `flow`: `<log_dir>/<flow>_log_<YYYYmmdd_HHMMSS>.csv`.
  pub fn log_path(&self, flow: &str, at: DateTime<Local>) -> PathBuf {
    self
      .log_dir
      .join(format!("{flow}_log_{}.csv", at.format("%Y%m%d_%H%M%S")))
  }
}
