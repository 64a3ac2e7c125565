//! Capability interface over the external page surface.
//!
//! The core only speaks in logical names (`continue_step_2`, `results`,
//! `tracking_option`); a backend maps them to real markup. Two backends ship:
//! [replay::ReplaySurface] (scripted, JSON) and, with the `browser` feature,
//! `cdp::CdpSurface` attached to a running browser.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SurfaceError;
use crate::types::RowSnapshot;

#[cfg(feature = "browser")]
pub mod cdp;
mod driver;
pub mod replay;
pub mod selectors;

pub use driver::{Driver, Timeouts};

/// A logical control or field on the page, optionally the n-th of several.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
  pub name: String,
  #[serde(default)]
  pub index: Option<usize>,
}

impl Target {
  pub fn named(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      index: None,
    }
  }

  pub fn nth(name: impl Into<String>, index: usize) -> Self {
    Self {
      name: name.into(),
      index: Some(index),
    }
  }

  /// Position addressed by this target (first match when unset).
  pub fn position(&self) -> usize {
    self.index.unwrap_or(0)
  }
}

impl fmt::Display for Target {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.index {
      Some(i) => write!(f, "{}[{}]", self.name, i),
      None => f.write_str(&self.name),
    }
  }
}

/// Interactions the workflows perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
  Click { target: Target },
  DoubleClick { target: Target },
  Fill { target: Target, value: String },
  /// Picks the option at `position` in the currently open option list named
  /// by `target` and returns its text.
  SelectOption { target: Target, position: usize },
  /// Ensures a checkbox/radio is checked.
  Check { target: Target },
  ReadText { target: Target },
}

impl Action {
  pub fn target(&self) -> &Target {
    match self {
      Action::Click { target }
      | Action::DoubleClick { target }
      | Action::Fill { target, .. }
      | Action::SelectOption { target, .. }
      | Action::Check { target }
      | Action::ReadText { target } => target,
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      Action::Click { .. } => "click",
      Action::DoubleClick { .. } => "double_click",
      Action::Fill { .. } => "fill",
      Action::SelectOption { .. } => "select_option",
      Action::Check { .. } => "check",
      Action::ReadText { .. } => "read_text",
    }
  }
}

/// What an interaction produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutput {
  Done,
  Text(String),
}

impl ActionOutput {
  pub fn into_text(self) -> Option<String> {
    match self {
      ActionOutput::Text(s) => Some(s),
      ActionOutput::Done => None,
    }
  }
}

/// The external page surface: one live page/tab, driven by one caller at a time.
///
/// Implementations may block; callers bound every call through [Driver].
#[async_trait]
pub trait PageSurface: Send {
  /// Loads `url` in the page.
  async fn navigate(&mut self, url: &str) -> Result<(), SurfaceError>;

  /// Snapshots the rows of the logical table `table` on the current page.
  /// Zero rows is `Ok(vec![])`.
  async fn query(&mut self, table: &str) -> Result<Vec<RowSnapshot>, SurfaceError>;

  /// Whether `target` is currently on the page.
  async fn is_present(&mut self, target: &Target) -> Result<bool, SurfaceError>;

  async fn interact(&mut self, action: &Action) -> Result<ActionOutput, SurfaceError>;

  /// Releases the surface. Further calls fail with [SurfaceError::Closed].
  async fn close(&mut self) -> Result<(), SurfaceError>;
}
