//! Quantity and amount reconciliation against lookup values.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::StepFailure;

/// How a pack count is entered on the label form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackSplit {
  pub units_per_carton: u32,
  pub carton_count: u32,
}

/// Splits `pack` units into cartons of `master_pack`.
///
/// Fewer units than a master pack ship loose (one unit per carton). A count
/// that is not a whole number of master packs is flagged, never rounded.
pub fn reconcile_pack(pack: u32, master_pack: u32) -> Result<PackSplit, StepFailure> {
  if master_pack == 0 {
    return Err(StepFailure::IndivisiblePack { pack, master_pack });
  }
  if pack < master_pack {
    return Ok(PackSplit {
      units_per_carton: 1,
      carton_count: pack,
    });
  }
  if pack % master_pack != 0 {
    return Err(StepFailure::IndivisiblePack { pack, master_pack });
  }
  Ok(PackSplit {
    units_per_carton: master_pack,
    carton_count: pack / master_pack,
  })
}

/// Allowed difference between displayed and expected totals.
pub const AMOUNT_TOLERANCE: f64 = 0.01;

static AMOUNT_PATTERN: LazyLock<Option<Regex>> =
  LazyLock::new(|| Regex::new(r"^-?\$?\s*-?(\d{1,3}(,\d{3})+|\d+)(\.\d+)?$").ok());

/// Parses a currency text such as `$1,234.56`, `1234.5` or ` 12 `.
pub fn parse_amount(raw: &str) -> Result<f64, StepFailure> {
  let trimmed = raw.trim();
  let invalid = || StepFailure::InvalidAmount {
    raw: raw.to_string(),
  };
  let well_formed = AMOUNT_PATTERN
    .as_ref()
    .is_some_and(|re| re.is_match(trimmed));
  if !well_formed {
    return Err(invalid());
  }
  let digits: String = trimmed
    .chars()
    .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
    .collect();
  digits.parse::<f64>().map_err(|_| invalid())
}

/// Accepts `displayed` when it is within [AMOUNT_TOLERANCE] of `expected`.
///
/// The slack above the tolerance only absorbs binary rounding of the two
/// operands, so a difference of exactly one cent passes and 0.0101 does not.
pub fn reconcile_amount(displayed: f64, expected: f64) -> Result<(), StepFailure> {
  let scale = displayed.abs().max(expected.abs()).max(1.0);
  let slack = 4.0 * f64::EPSILON * scale;
  if (displayed - expected).abs() <= AMOUNT_TOLERANCE + slack {
    Ok(())
  } else {
    Err(StepFailure::PriceMismatch {
      displayed,
      expected,
    })
  }
}
