//! Operator date parsing, listing/form date formats and the business-day ETA.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use tracing::instrument;

use crate::error::{EtaError, PortalError};

/// Format the operator types and date-entry fields expect.
pub const FORM_DATE_FORMAT: &str = "%m/%d/%Y";

/// Parses an operator-entered `MM/DD/YYYY` date.
pub fn parse_operator_date(input: &str) -> Result<NaiveDate, PortalError> {
  let trimmed = input.trim();
  NaiveDate::parse_from_str(trimmed, FORM_DATE_FORMAT).map_err(|_| PortalError::Date {
    input: trimmed.to_string(),
  })
}

/// Renders a date the way result listings show it: `Mon D, YYYY`, day not
/// zero-padded (`Mar 7, 2025`).
pub fn format_listing_date(date: NaiveDate) -> String {
  date.format("%b %-d, %Y").to_string()
}

/// Renders a date for a date-entry field: `MM/DD/YYYY`.
pub fn format_form_date(date: NaiveDate) -> String {
  date.format(FORM_DATE_FORMAT).to_string()
}

/// Formats accepted when reading dates back from a page or an input sheet.
const PAGE_DATE_FORMATS: &[&str] = &[FORM_DATE_FORMAT, "%b %d, %Y", "%Y-%m-%d"];

/// Parses a date shown on a page or in an input sheet: `MM/DD/YYYY` (padding
/// optional), `Mon D, YYYY` or `YYYY-MM-DD`.
pub fn parse_page_date(text: &str) -> Option<NaiveDate> {
  let text = text.trim();
  PAGE_DATE_FORMATS
    .iter()
    .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

pub fn is_weekend(date: NaiveDate) -> bool {
  matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Arrival date for a shipment leaving on `ship_date` with `transit_days`
/// business days in transit.
///
/// Walks forward one calendar day at a time counting only weekdays until the
/// count reaches `transit_days`, then pushes a weekend landing day to the
/// following Monday. With `transit_days == 0` a weekday ship date is returned
/// unchanged.
#[instrument(level = "trace")]
pub fn compute_arrival(ship_date: NaiveDate, transit_days: i64) -> Result<NaiveDate, EtaError> {
  if transit_days < 0 {
    return Err(EtaError::Negative(transit_days));
  }
  let mut day = ship_date;
  let mut counted = 0;
  while counted < transit_days {
    day = next_day(day);
    if !is_weekend(day) {
      counted += 1;
    }
  }
  while is_weekend(day) {
    day = next_day(day);
  }
  Ok(day)
}

fn next_day(date: NaiveDate) -> NaiveDate {
  // Only fails at NaiveDate::MAX.
  date.checked_add_days(Days::new(1)).unwrap_or(date)
}
