//! Shared fixtures for unit tests.

use std::collections::BTreeMap;

use crate::extractor::{LINK_FIELD, LOCATION_FIELD};
use crate::surface::replay::{ReplayPage, ReplayProbe, ReplayScript, ReplaySurface};
use crate::surface::{Action, Driver, Timeouts};
use crate::types::{FieldValue, Record};

/// Timeouts short enough that a missing control fails a test in milliseconds.
pub fn fast_timeouts() -> Timeouts {
  Timeouts {
    navigation_ms: 200,
    element_wait_ms: 60,
    action_ms: 60,
    poll_ms: 5,
    settle_ms: 0,
  }
}

/// Driver over a replay surface, plus a probe into what it did.
pub fn replay_driver(script: ReplayScript) -> (Driver, ReplayProbe) {
  let surface = ReplaySurface::new(script);
  let probe = surface.probe();
  (Driver::new(Box::new(surface), fast_timeouts()), probe)
}

/// Listing record as the extractor builds it.
pub fn listing_record(id: &str, location: &str, link: &str) -> Record {
  let mut fields = BTreeMap::new();
  fields.insert(
    LOCATION_FIELD.to_string(),
    FieldValue::Text(location.to_string()),
  );
  fields.insert(LINK_FIELD.to_string(), FieldValue::Link(link.to_string()));
  Record::new(id, fields)
}

/// Script with a single detail page at `url`.
pub fn one_page(url: &str, page: ReplayPage) -> ReplayScript {
  let mut script = ReplayScript::default();
  script.pages.insert(url.to_string(), page);
  script
}

/// `name` repeated `n` times, for multi-instance controls.
pub fn repeated(name: &str, n: usize) -> Vec<String> {
  vec![name.to_string(); n]
}

pub fn clicked(probe: &ReplayProbe) -> Vec<String> {
  probe
    .actions()
    .into_iter()
    .filter_map(|a| match a {
      Action::Click { target } => Some(target.to_string()),
      _ => None,
    })
    .collect()
}
