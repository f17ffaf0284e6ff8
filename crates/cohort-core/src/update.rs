//! Membership updates: turning a caller's add/remove request into a validated,
//! conflict-free batch that storage applies as one transaction.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  validate::{validate_bulk_size, validate_slug, validate_user_id},
};

/// TTLs must fall strictly inside `(0, MAX_TTL_HOURS)` to take effect.
pub const MAX_TTL_HOURS: i64 = 720;

/// A caller's requested change to one user's manual memberships.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipUpdate {
  #[serde(default)]
  pub add:       Vec<String>,
  #[serde(default)]
  pub remove:    Vec<String>,
  /// Lifetime of the added memberships. Out-of-range values are ignored and
  /// the memberships become permanent.
  pub ttl_hours: Option<i64>,
}

/// A validated update, ready for [`crate::store::SegmentStore::apply_membership_batch`].
///
/// Storage applies every removal, then every addition, appending one history
/// entry per slug, and commits all of it or none of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipBatch {
  pub user_id:     i64,
  pub remove:      Vec<String>,
  pub add:         Vec<String>,
  /// Written to every added membership row.
  pub expires_at:  Option<DateTime<Utc>>,
  /// Timestamp of every history entry in the batch.
  pub recorded_at: DateTime<Utc>,
}

/// `now + ttl_hours` when the TTL is within `(0, 720)` hours, else `None`.
pub fn effective_expiry(ttl_hours: Option<i64>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
  ttl_hours
    .filter(|h| (1..MAX_TTL_HOURS).contains(h))
    .map(|h| now + Duration::hours(h))
}

/// Validate `update` for `user_id` and build the batch to apply.
///
/// Fails before anything reaches storage. The checks run in order: list
/// sizes, user id, slugs, then slugs present in both lists.
pub fn plan_update(
  user_id: i64,
  update: MembershipUpdate,
  now: DateTime<Utc>,
) -> Result<MembershipBatch> {
  validate_bulk_size(&update.add, &update.remove)?;
  validate_user_id(user_id)?;

  let expires_at = effective_expiry(update.ttl_hours, now);

  for slug in update.add.iter().chain(&update.remove) {
    validate_slug(slug)?;
  }

  let adding: HashSet<&str> = update.add.iter().map(String::as_str).collect();
  if let Some(slug) = update.remove.iter().find(|s| adding.contains(s.as_str())) {
    return Err(Error::SegmentConflict(slug.clone()));
  }

  Ok(MembershipBatch {
    user_id,
    remove: update.remove,
    add: update.add,
    expires_at,
    recorded_at: now,
  })
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap() }

  fn update(add: &[&str], remove: &[&str], ttl_hours: Option<i64>) -> MembershipUpdate {
    MembershipUpdate {
      add: add.iter().map(|s| s.to_string()).collect(),
      remove: remove.iter().map(|s| s.to_string()).collect(),
      ttl_hours,
    }
  }

  #[test]
  fn ttl_window() {
    assert_eq!(effective_expiry(None, now()), None);
    assert_eq!(effective_expiry(Some(0), now()), None);
    assert_eq!(effective_expiry(Some(-5), now()), None);
    assert_eq!(effective_expiry(Some(720), now()), None);
    assert_eq!(effective_expiry(Some(1), now()), Some(now() + Duration::hours(1)));
    assert_eq!(effective_expiry(Some(719), now()), Some(now() + Duration::hours(719)));
  }

  #[test]
  fn plan_keeps_lists_and_stamps_time() {
    let batch = plan_update(7, update(&["DARK_MODE"], &["OLD_UI"], Some(24)), now()).unwrap();
    assert_eq!(batch.user_id, 7);
    assert_eq!(batch.add, ["DARK_MODE"]);
    assert_eq!(batch.remove, ["OLD_UI"]);
    assert_eq!(batch.expires_at, Some(now() + Duration::hours(24)));
    assert_eq!(batch.recorded_at, now());
  }

  #[test]
  fn conflict_names_the_slug() {
    let err = plan_update(
      1000,
      update(&["KEEP", "MANUAL_PERMANENT"], &["MANUAL_PERMANENT"], Some(24)),
      now(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::SegmentConflict(ref s) if s == "MANUAL_PERMANENT"));
  }

  #[test]
  fn invalid_slug_in_either_list_aborts() {
    let long = "averylongslugwithmanywordsanddigits123123123123123123123123";
    let err = plan_update(1000, update(&[long], &["VOICE_MESSAGE"], None), now()).unwrap_err();
    assert!(matches!(err, Error::SlugLength));

    let err = plan_update(1000, update(&["VOICE_MESSAGE"], &["no-dashes"], None), now()).unwrap_err();
    assert!(matches!(err, Error::SlugFormat));
  }

  #[test]
  fn slug_validation_precedes_conflict_detection() {
    let err = plan_update(1000, update(&["ab"], &["ab"], None), now()).unwrap_err();
    assert!(matches!(err, Error::SlugLength));
  }

  #[test]
  fn bulk_limit_precedes_everything_else() {
    let add = vec!["1234".to_string(); 101];
    let err = plan_update(
      0,
      MembershipUpdate { add, remove: vec!["1234".into()], ttl_hours: Some(24) },
      now(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::TooManySegments));
  }

  #[test]
  fn rejects_non_positive_user() {
    let err = plan_update(0, update(&["DARK_MODE"], &[], None), now()).unwrap_err();
    assert!(matches!(err, Error::InvalidUserId));
  }
}
