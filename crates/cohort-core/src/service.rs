//! [`SegmentService`]: the operations exposed to transports, composed from
//! validation, resolution and update planning over a [`SegmentStore`].
//!
//! Every validation runs before the store is touched. Store errors are
//! converted into [`Error`] and returned as-is; nothing is retried or logged
//! here.

use crate::{
  Error, Result,
  clock::{Clock, SystemClock},
  history::HistoryEntry,
  resolve::resolve_active_segments,
  segment::{ActiveSegment, Segment},
  store::SegmentStore,
  update::{MembershipUpdate, plan_update},
  validate::{validate_percent, validate_report_period, validate_slug, validate_user_id},
};

pub struct SegmentService<S, C = SystemClock> {
  store: S,
  clock: C,
}

impl<S: SegmentStore> SegmentService<S> {
  pub fn new(store: S) -> Self { Self { store, clock: SystemClock } }
}

impl<S: SegmentStore, C: Clock> SegmentService<S, C> {
  pub fn with_clock(store: S, clock: C) -> Self { Self { store, clock } }

  pub fn store(&self) -> &S { &self.store }

  // ── Catalog ───────────────────────────────────────────────────────────

  pub async fn create_segment(
    &self,
    slug: String,
    auto_percent: Option<i64>,
  ) -> Result<Segment> {
    validate_slug(&slug)?;
    let auto_percent = validate_percent(auto_percent)?;
    self.store.create_segment(slug, auto_percent).await.map_err(Into::into)
  }

  pub async fn delete_segment(&self, slug: String) -> Result<bool> {
    self.store.delete_segment(slug).await.map_err(Into::into)
  }

  pub async fn segment_exists(&self, slug: String) -> Result<bool> {
    self.store.segment_exists(slug).await.map_err(Into::into)
  }

  pub async fn list_segments(&self) -> Result<Vec<String>> {
    self.store.list_segments().await.map_err(Into::into)
  }

  // ── Memberships ───────────────────────────────────────────────────────

  /// The segments active for `user_id` right now.
  pub async fn user_segments(&self, user_id: i64) -> Result<Vec<ActiveSegment>> {
    validate_user_id(user_id)?;
    let rows = self.store.membership_view(user_id).await.map_err(Into::into)?;
    resolve_active_segments(user_id, rows, self.clock.now())
  }

  /// Apply `update` to `user_id`'s manual memberships atomically.
  pub async fn update_user_segments(&self, user_id: i64, update: MembershipUpdate) -> Result<()> {
    let batch = plan_update(user_id, update, self.clock.now())?;
    self.store.apply_membership_batch(batch).await.map_err(Into::into)
  }

  /// Manually assign `user_id` to an existing segment, with no expiry.
  pub async fn add_user_to_segment(&self, user_id: i64, slug: String) -> Result<()> {
    validate_user_id(user_id)?;
    if slug.is_empty() {
      return Err(Error::EmptySlug);
    }
    if !self.segment_exists(slug.clone()).await? {
      return Err(Error::SlugNotFound(slug));
    }
    self.store.insert_membership(user_id, slug).await.map_err(Into::into)
  }

  // ── History ───────────────────────────────────────────────────────────

  pub async fn history(&self) -> Result<Vec<HistoryEntry>> {
    self.store.list_history().await.map_err(Into::into)
  }

  /// History for a fully elapsed calendar month.
  pub async fn history_for_month(&self, year: i32, month: u32) -> Result<Vec<HistoryEntry>> {
    validate_report_period(year, month, self.clock.now().date_naive())?;
    self.store.list_history_for_month(year, month).await.map_err(Into::into)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use chrono::{DateTime, Duration, TimeZone, Utc};

  use super::*;
  use crate::{
    clock::FixedClock,
    history::Operation,
    memory::MemoryStore,
    segment::Assignment,
    update::MembershipBatch,
  };

  fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 10, 16, 12, 0, 0).unwrap() }

  fn service() -> SegmentService<MemoryStore, FixedClock> {
    SegmentService::with_clock(MemoryStore::new(), FixedClock(now()))
  }

  fn update(add: &[&str], remove: &[&str], ttl_hours: Option<i64>) -> MembershipUpdate {
    MembershipUpdate {
      add: add.iter().map(|s| s.to_string()).collect(),
      remove: remove.iter().map(|s| s.to_string()).collect(),
      ttl_hours,
    }
  }

  // ─── Catalog ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_validates_before_storage() {
    let svc = service();
    assert!(matches!(svc.create_segment("".into(), None).await, Err(Error::EmptySlug)));
    assert!(matches!(svc.create_segment("ab".into(), None).await, Err(Error::SlugLength)));
    assert!(matches!(svc.create_segment("a-b-c".into(), None).await, Err(Error::SlugFormat)));
    assert!(matches!(
      svc.create_segment("NEGATIVE".into(), Some(-1)).await,
      Err(Error::PercentBelowZero)
    ));
    assert!(matches!(
      svc.create_segment("TOO_MUCH".into(), Some(101)).await,
      Err(Error::PercentAboveHundred)
    ));
    assert!(svc.list_segments().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn create_surfaces_duplicate() {
    let svc = service();
    let seg = svc.create_segment("DARK_MODE".into(), Some(30)).await.unwrap();
    assert_eq!(seg, Segment { slug: "DARK_MODE".into(), auto_percent: Some(30) });

    let err = svc.create_segment("DARK_MODE".into(), None).await.unwrap_err();
    assert!(err.is_conflict());
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn concurrent_creation_of_distinct_slugs() {
    let svc = Arc::new(service());
    let tasks: Vec<_> = (0..100)
      .map(|i| {
        let svc = Arc::clone(&svc);
        tokio::spawn(async move { svc.create_segment(format!("CONCURRENT_SEGMENT_{i}"), None).await })
      })
      .collect();
    for task in tasks {
      task.await.unwrap().unwrap();
    }

    let mut slugs = svc.list_segments().await.unwrap();
    assert_eq!(slugs.len(), 100);
    slugs.dedup();
    assert_eq!(slugs.len(), 100);
  }

  // ─── Resolution ──────────────────────────────────────────────────────────

  #[tokio::test]
  async fn user_segments_combine_manual_and_rollout() {
    let svc = service();
    for (slug, percent) in [
      ("MANUAL_PERMANENT", Some(10)),
      ("MANUAL_EXPIRED_TTL", None),
      ("NEW_CHECKOUT", Some(10)), // bucket(1000) == 1
      ("AUTO_MISS", Some(10)),    // bucket(1000) == 30
      ("MANUAL_ACTIVE_TTL", Some(10)),
    ] {
      svc.create_segment(slug.into(), percent).await.unwrap();
    }
    svc.add_user_to_segment(1000, "MANUAL_PERMANENT".into()).await.unwrap();

    // A TTL assignment made two days ago, expired yesterday.
    svc
      .store()
      .apply_membership_batch(MembershipBatch {
        user_id:     1000,
        remove:      vec![],
        add:         vec!["MANUAL_EXPIRED_TTL".into()],
        expires_at:  Some(now() - Duration::hours(24)),
        recorded_at: now() - Duration::hours(48),
      })
      .await
      .unwrap();
    svc
      .update_user_segments(1000, update(&["MANUAL_ACTIVE_TTL"], &[], Some(24)))
      .await
      .unwrap();

    let active = svc.user_segments(1000).await.unwrap();
    let mut slugs: Vec<_> = active.iter().map(|a| a.slug.as_str()).collect();
    slugs.sort_unstable();
    assert_eq!(slugs, ["MANUAL_ACTIVE_TTL", "MANUAL_PERMANENT", "NEW_CHECKOUT"]);

    let ttl = active.iter().find(|a| a.slug == "MANUAL_ACTIVE_TTL").unwrap();
    assert_eq!(ttl.assignment, Assignment::Manual { expires_at: Some(now() + Duration::hours(24)) });
  }

  #[tokio::test]
  async fn user_segments_rejects_invalid_user() {
    let err = service().user_segments(0).await.unwrap_err();
    assert!(matches!(err, Error::InvalidUserId));
  }

  // ─── Updates ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn conflicting_update_leaves_storage_unchanged() {
    let svc = service();
    svc.create_segment("MANUAL_PERMANENT".into(), None).await.unwrap();
    svc.create_segment("OTHER_ONE".into(), None).await.unwrap();
    svc.add_user_to_segment(1000, "OTHER_ONE".into()).await.unwrap();

    let before = svc.store().membership_view(1000).await.unwrap();
    let err = svc
      .update_user_segments(
        1000,
        update(&["MANUAL_PERMANENT"], &["OTHER_ONE", "MANUAL_PERMANENT"], Some(24)),
      )
      .await
      .unwrap_err();
    assert!(matches!(err, Error::SegmentConflict(ref s) if s == "MANUAL_PERMANENT"));

    assert_eq!(svc.store().membership_view(1000).await.unwrap(), before);
    assert!(svc.history().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn oversized_update_fails_before_storage() {
    let svc = service();
    svc.create_segment("ABCD".into(), None).await.unwrap();
    let add = vec!["ABCD".to_string(); 101];

    let err = svc
      .update_user_segments(1000, MembershipUpdate { add, remove: vec![], ttl_hours: None })
      .await
      .unwrap_err();
    assert!(matches!(err, Error::TooManySegments));
    assert!(svc.history().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn storage_failure_rolls_back_whole_batch() {
    let svc = service();
    for slug in ["AAA", "BBB", "CCC"] {
      svc.create_segment(slug.into(), None).await.unwrap();
    }
    svc.add_user_to_segment(3, "AAA".into()).await.unwrap();
    svc.store().fail_inserts_of("CCC");

    let err = svc
      .update_user_segments(3, update(&["BBB", "CCC"], &["AAA"], None))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InsertFailed(_)));

    let active: Vec<_> = svc.user_segments(3).await.unwrap().into_iter().map(|a| a.slug).collect();
    assert_eq!(active, ["AAA"]);
    assert!(svc.history().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn applied_update_records_history() {
    let svc = service();
    for slug in ["AAA", "BBB"] {
      svc.create_segment(slug.into(), None).await.unwrap();
    }
    svc.update_user_segments(9, update(&["BBB"], &["AAA"], Some(5000))).await.unwrap();

    let history = svc.history().await.unwrap();
    let ops: Vec<_> = history.iter().map(|e| (e.segment_slug.as_str(), e.operation)).collect();
    assert_eq!(ops, [("AAA", Operation::Removed), ("BBB", Operation::Added)]);
    assert!(history.iter().all(|e| e.user_id == 9 && e.recorded_at == now()));

    // Out-of-range TTL was ignored: the membership is permanent.
    let active = svc.user_segments(9).await.unwrap();
    assert_eq!(active[0].assignment, Assignment::Manual { expires_at: None });
  }

  // ─── Manual add ──────────────────────────────────────────────────────────

  #[tokio::test]
  async fn add_user_to_missing_segment() {
    let err = service().add_user_to_segment(5, "NOPE_NOT_HERE".into()).await.unwrap_err();
    assert!(err.is_not_found());
  }

  #[tokio::test]
  async fn add_user_validates_input() {
    let svc = service();
    assert!(matches!(svc.add_user_to_segment(0, "ABC".into()).await, Err(Error::InvalidUserId)));
    assert!(matches!(svc.add_user_to_segment(5, "".into()).await, Err(Error::EmptySlug)));
  }

  // ─── History ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn history_for_month_validates_period() {
    let svc = service();
    assert!(matches!(
      svc.history_for_month(2025, 10).await,
      Err(Error::PeriodNotElapsed { year: 2025, month: 10 })
    ));
    assert!(matches!(svc.history_for_month(1999, 5).await, Err(Error::YearTooEarly(1999))));
    assert!(svc.history_for_month(2025, 9).await.unwrap().is_empty());
  }
}
