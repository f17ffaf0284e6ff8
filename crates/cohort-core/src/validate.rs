//! Input validation. Every function here is pure: it sees only its arguments.

use chrono::{Datelike, NaiveDate};

use crate::{Error, Result};

pub const SLUG_MIN_LEN: usize = 3;
pub const SLUG_MAX_LEN: usize = 50;
/// Upper bound on each of the add and remove lists of one update.
pub const MAX_BULK_SEGMENTS: usize = 100;
/// Earliest year a history report may cover.
pub const MIN_REPORT_YEAR: i32 = 2000;

/// Checks, in order: non-empty, length in `3..=50` bytes, `[A-Za-z0-9_]` only.
pub fn validate_slug(slug: &str) -> Result<()> {
  if slug.is_empty() {
    return Err(Error::EmptySlug);
  }
  if !(SLUG_MIN_LEN..=SLUG_MAX_LEN).contains(&slug.len()) {
    return Err(Error::SlugLength);
  }
  if !slug.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
    return Err(Error::SlugFormat);
  }
  Ok(())
}

/// Accepts an absent percentage, or one in `0..=100`, narrowed to `u8`.
pub fn validate_percent(percent: Option<i64>) -> Result<Option<u8>> {
  match percent {
    None => Ok(None),
    Some(p) if p < 0 => Err(Error::PercentBelowZero),
    Some(p) if p > 100 => Err(Error::PercentAboveHundred),
    Some(p) => Ok(Some(p as u8)),
  }
}

pub fn validate_user_id(user_id: i64) -> Result<()> {
  if user_id <= 0 {
    return Err(Error::InvalidUserId);
  }
  Ok(())
}

pub fn validate_bulk_size(add: &[String], remove: &[String]) -> Result<()> {
  if add.len() > MAX_BULK_SEGMENTS || remove.len() > MAX_BULK_SEGMENTS {
    return Err(Error::TooManySegments);
  }
  Ok(())
}

/// A report period must be a fully elapsed calendar month, no earlier than
/// January 2000, relative to `today`.
pub fn validate_report_period(year: i32, month: u32, today: NaiveDate) -> Result<()> {
  if !(1..=12).contains(&month) {
    return Err(Error::InvalidMonth(month));
  }
  if year < MIN_REPORT_YEAR {
    return Err(Error::YearTooEarly(year));
  }
  if (year, month) >= (today.year(), today.month()) {
    return Err(Error::PeriodNotElapsed { year, month });
  }
  Ok(())
}
