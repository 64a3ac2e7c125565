//! Extracted records and the ordered, id-deduplicated set they accumulate in.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One extracted field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
  Text(String),
  Date(NaiveDate),
  /// Navigation reference (absolute URL).
  Link(String),
}

impl FieldValue {
  /// String form used for logging and URL templates.
  pub fn as_text(&self) -> String {
    match self {
      FieldValue::Text(s) | FieldValue::Link(s) => s.clone(),
      FieldValue::Date(d) => d.format("%m/%d/%Y").to_string(),
    }
  }
}

/// A record produced by the extractor: an identifier plus named fields.
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
  id: String,
  fields: BTreeMap<String, FieldValue>,
}

impl Record {
  pub fn new(id: impl Into<String>, fields: BTreeMap<String, FieldValue>) -> Self {
    Self {
      id: id.into(),
      fields,
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn field(&self, name: &str) -> Option<&FieldValue> {
    self.fields.get(name)
  }

  /// Text of a field, or `None` when absent. Dates render as `MM/DD/YYYY`.
  pub fn text(&self, name: &str) -> Option<String> {
    self.fields.get(name).map(FieldValue::as_text)
  }

  pub fn date(&self, name: &str) -> Option<NaiveDate> {
    match self.fields.get(name) {
      Some(FieldValue::Date(d)) => Some(*d),
      _ => None,
    }
  }

  pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
    &self.fields
  }
}

/// Records keyed by id, iterated in first-seen order.
///
/// Re-inserting an id replaces its fields (last seen wins) but keeps its
/// original position, so processing order follows pagination order.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
  records: Vec<Record>,
  index: HashMap<String, usize>,
}

impl RecordSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, record: Record) {
    match self.index.get(record.id()) {
      Some(&pos) => self.records[pos] = record,
      None => {
        self.index.insert(record.id().to_string(), self.records.len());
        self.records.push(record);
      }
    }
  }

  /// Merges `other` into `self`; ids already present are overwritten.
  pub fn merge(&mut self, other: RecordSet) {
    for record in other.records {
      self.insert(record);
    }
  }

  pub fn get(&self, id: &str) -> Option<&Record> {
    self.index.get(id).map(|&pos| &self.records[pos])
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Record> {
    self.records.iter()
  }

  pub fn ids(&self) -> Vec<&str> {
    self.records.iter().map(Record::id).collect()
  }

  /// Reorders records by the text of `field` (stable; records without the
  /// field sort first).
  pub fn sort_by_field(&mut self, field: &str) {
    self.records.sort_by_key(|r| r.text(field));
    self.index = self
      .records
      .iter()
      .enumerate()
      .map(|(pos, r)| (r.id().to_string(), pos))
      .collect();
  }
}

impl FromIterator<Record> for RecordSet {
  fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
    let mut set = RecordSet::new();
    for record in iter {
      set.insert(record);
    }
    set
  }
}

impl IntoIterator for RecordSet {
  type Item = Record;
  type IntoIter = std::vec::IntoIter<Record>;

  fn into_iter(self) -> Self::IntoIter {
    self.records.into_iter()
  }
}
