//! Mapping from logical names to page markup, consumed by browser backends.
//!
//! Selectors are CSS; ` >>> ` descends into the shadow root of the element
//! matched so far (`kat-date-picker#ship >>> kat-input >>> input`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::SurfaceError;

/// Separator that pierces a shadow root inside a selector chain.
pub const SHADOW_PIERCE: &str = ">>>";

/// Selector for a control or field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlSelector {
  Css(String),
  Detailed {
    css: String,
    /// Strip a `disabled` attribute before clicking.
    #[serde(default)]
    force: bool,
  },
}

impl ControlSelector {
  pub fn css(&self) -> &str {
    match self {
      ControlSelector::Css(css) | ControlSelector::Detailed { css, .. } => css,
    }
  }

  pub fn force(&self) -> bool {
    matches!(self, ControlSelector::Detailed { force: true, .. })
  }

  /// Selector chain split at shadow-root boundaries.
  pub fn chain(&self) -> Vec<String> {
    split_chain(self.css())
  }
}

/// How to read one logical field out of a table row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSelector {
  /// Selector relative to the row; the row itself when absent.
  #[serde(default)]
  pub css: Option<String>,
  /// Attribute to read; inner text when absent.
  #[serde(default)]
  pub attribute: Option<String>,
  /// Join every match with ` | ` instead of taking the first.
  #[serde(default)]
  pub all: bool,
}

/// Rows of a logical table and the fields read from each.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSelector {
  pub row: String,
  #[serde(default)]
  pub fields: HashMap<String, FieldSelector>,
}

/// Complete logical-name → markup mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorMap {
  pub controls: HashMap<String, ControlSelector>,
  pub tables: HashMap<String, TableSelector>,
}

impl SelectorMap {
  pub fn control(&self, name: &str) -> Result<&ControlSelector, SurfaceError> {
    self
      .controls
      .get(name)
      .ok_or_else(|| SurfaceError::NotFound(format!("no selector mapped for control '{name}'")))
  }

  pub fn table(&self, name: &str) -> Result<&TableSelector, SurfaceError> {
    self
      .tables
      .get(name)
      .ok_or_else(|| SurfaceError::NotFound(format!("no selector mapped for table '{name}'")))
  }
}

pub(crate) fn split_chain(css: &str) -> Vec<String> {
  css
    .split(SHADOW_PIERCE)
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(String::from)
    .collect()
}
