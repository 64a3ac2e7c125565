//! Structured snapshot of one row read from the page surface.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One row of a table on the page, fields addressed by logical name.
/// A field the surface could not read is simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowSnapshot {
  fields: HashMap<String, String>,
}

impl RowSnapshot {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder-style insert, used by surfaces and tests.
  pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.fields.insert(name.into(), value.into());
    self
  }

  /// Field value trimmed; empty values count as missing.
  pub fn get(&self, name: &str) -> Option<&str> {
    self
      .fields
      .get(name)
      .map(|v| v.trim())
      .filter(|v| !v.is_empty())
  }
}

impl From<HashMap<String, String>> for RowSnapshot {
  fn from(fields: HashMap<String, String>) -> Self {
    Self { fields }
  }
}
