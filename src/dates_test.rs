//! Tests for date formats and `compute_arrival`.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use proptest::prelude::*;

use crate::dates::{
  compute_arrival, format_form_date, format_listing_date, is_weekend, parse_operator_date,
  parse_page_date,
};
use crate::error::EtaError;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn operator_date_parses_and_reformats_without_padding() {
  let date = parse_operator_date(" 03/07/2025 ").unwrap();
  assert_eq!(date, d(2025, 3, 7));
  assert_eq!(format_listing_date(date), "Mar 7, 2025");
  assert_eq!(format_listing_date(d(2025, 12, 11)), "Dec 11, 2025");
  assert_eq!(format_form_date(date), "03/07/2025");
}

#[test]
fn operator_date_rejects_other_formats() {
  assert!(parse_operator_date("2025-03-07").is_err());
  assert!(parse_operator_date("13/01/2025").is_err());
  assert!(parse_operator_date("").is_err());
}

#[test]
fn page_dates_accept_unpadded_form() {
  assert_eq!(parse_page_date("3/7/2025"), Some(d(2025, 3, 7)));
  assert_eq!(parse_page_date("03/07/2025"), Some(d(2025, 3, 7)));
  assert_eq!(parse_page_date("Mar 7"), None);
}

#[test]
fn page_dates_accept_listing_and_iso_forms() {
  assert_eq!(parse_page_date(" Mar 7, 2025 "), Some(d(2025, 3, 7)));
  assert_eq!(parse_page_date("2025-03-07"), Some(d(2025, 3, 7)));
  assert_eq!(parse_page_date("07.03.2025"), None);
}

#[test]
fn friday_plus_one_is_monday() {
  let friday = d(2025, 3, 14);
  assert_eq!(friday.weekday(), Weekday::Fri);
  assert_eq!(compute_arrival(friday, 1), Ok(d(2025, 3, 17)));
}

#[test]
fn zero_days_keeps_monday() {
  let monday = d(2025, 3, 17);
  assert_eq!(compute_arrival(monday, 0), Ok(monday));
}

#[test]
fn zero_days_from_weekend_lands_on_monday() {
  assert_eq!(compute_arrival(d(2025, 3, 15), 0), Ok(d(2025, 3, 17)));
  assert_eq!(compute_arrival(d(2025, 3, 16), 0), Ok(d(2025, 3, 17)));
}

#[test]
fn wednesday_plus_five_crosses_one_weekend() {
  assert_eq!(compute_arrival(d(2025, 3, 12), 5), Ok(d(2025, 3, 19)));
}

#[test]
fn negative_days_are_rejected() {
  assert_eq!(
    compute_arrival(d(2025, 3, 12), -1),
    Err(EtaError::Negative(-1))
  );
}

fn weekdays_in(after: NaiveDate, through: NaiveDate) -> i64 {
  let mut n = 0;
  let mut day = after;
  while day < through {
    day = day.checked_add_days(Days::new(1)).unwrap();
    if !is_weekend(day) {
      n += 1;
    }
  }
  n
}

proptest! {
  #[test]
  fn arrival_is_weekday_with_exact_business_days(
    offset in 0u64..3650,
    transit in prop::sample::select(vec![0i64, 1, 5, 10]),
  ) {
    let mut ship = d(2020, 1, 1).checked_add_days(Days::new(offset)).unwrap();
    while is_weekend(ship) {
      ship = ship.checked_add_days(Days::new(1)).unwrap();
    }
    let arrival = compute_arrival(ship, transit).unwrap();
    prop_assert!(!is_weekend(arrival));
    prop_assert_eq!(weekdays_in(ship, arrival), transit);
  }

  #[test]
  fn zero_transit_is_identity_on_weekdays(offset in 0u64..3650) {
    let day = d(2020, 1, 1).checked_add_days(Days::new(offset)).unwrap();
    prop_assume!(!is_weekend(day));
    prop_assert_eq!(compute_arrival(day, 0).unwrap(), day);
  }
}
