//! The `SegmentStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `cohort-store-sqlite`,
//! or [`crate::memory::MemoryStore`]). The service layer depends on this
//! abstraction, never on a concrete backend. Concurrency control (slug
//! uniqueness, batch atomicity) is the backend's job.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
  history::HistoryEntry,
  segment::{MembershipRow, Segment},
  update::MembershipBatch,
};

/// Abstraction over a segment store backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`). Dropping a future before it
/// completes must never leave a batch half-applied.
pub trait SegmentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  // ── Catalog ───────────────────────────────────────────────────────────

  /// Insert a segment. A slug that already exists fails with a duplicate-slug
  /// error (`crate::Error::DuplicateSlug` after conversion).
  fn create_segment(
    &self,
    slug: String,
    auto_percent: Option<u8>,
  ) -> impl Future<Output = Result<Segment, Self::Error>> + Send + '_;

  /// Delete a segment and every manual membership in it. History is kept.
  /// Returns `false` if no such segment existed.
  fn delete_segment(
    &self,
    slug: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn segment_exists(
    &self,
    slug: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// All slugs, in ascending order.
  fn list_segments(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  // ── Memberships ───────────────────────────────────────────────────────

  /// Every catalog segment joined with `user_id`'s manual membership, if any.
  fn membership_view(
    &self,
    user_id: i64,
  ) -> impl Future<Output = Result<Vec<MembershipRow>, Self::Error>> + Send + '_;

  /// Insert a permanent manual membership. No history entry is written.
  fn insert_membership(
    &self,
    user_id: i64,
    slug: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Apply `batch` in a single transaction: delete each removed membership,
  /// then upsert each added one with `batch.expires_at`, appending a history
  /// entry for every step. On any failure nothing is persisted.
  fn apply_membership_batch(
    &self,
    batch: MembershipBatch,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── History ───────────────────────────────────────────────────────────

  /// The full history, in insertion order.
  fn list_history(
    &self,
  ) -> impl Future<Output = Result<Vec<HistoryEntry>, Self::Error>> + Send + '_;

  /// History recorded during the given calendar month (UTC), oldest first.
  fn list_history_for_month(
    &self,
    year: i32,
    month: u32,
  ) -> impl Future<Output = Result<Vec<HistoryEntry>, Self::Error>> + Send + '_;
}

/// The half-open range `[start of month, start of next month)` in UTC, or
/// `None` if `year`/`month` do not name a representable month.
pub fn month_bounds(year: i32, month: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
  let start = NaiveDate::from_ymd_opt(year, month, 1)?;
  let end = if month == 12 {
    NaiveDate::from_ymd_opt(year + 1, 1, 1)?
  } else {
    NaiveDate::from_ymd_opt(year, month + 1, 1)?
  };
  Some((
    start.and_hms_opt(0, 0, 0)?.and_utc(),
    end.and_hms_opt(0, 0, 0)?.and_utc(),
  ))
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn month_bounds_roll_over_december() {
    let (start, end) = month_bounds(2024, 12).unwrap();
    assert_eq!(start, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
    assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
  }

  #[test]
  fn month_bounds_reject_invalid_month() {
    assert!(month_bounds(2024, 0).is_none());
    assert!(month_bounds(2024, 13).is_none());
  }
}
