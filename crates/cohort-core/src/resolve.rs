//! Membership resolution: which segments are active for a user right now.
//!
//! Each catalog segment is evaluated on its own. A manual row decides the
//! outcome outright (active unless expired); without one, the segment is
//! active when the user's bucket falls below the rollout percentage.

use chrono::{DateTime, Utc};

use crate::{
  Result,
  bucket::bucket,
  segment::{ActiveSegment, Assignment, MembershipRow},
  validate::validate_user_id,
};

/// Evaluate a single row of the user's membership view.
///
/// Returns how the segment is assigned if it is active at `now`, or `None`.
pub fn assignment_for(
  user_id: i64,
  row: &MembershipRow,
  now: DateTime<Utc>,
) -> Option<Assignment> {
  if row.is_manual {
    return match row.expires_at {
      Some(at) if at <= now => None,
      expires_at => Some(Assignment::Manual { expires_at }),
    };
  }

  let auto_percent = row.auto_percent.unwrap_or(0);
  if auto_percent == 0 {
    return None;
  }
  let bucket = bucket(user_id, &row.slug);
  (bucket < auto_percent).then_some(Assignment::Rollout { auto_percent, bucket })
}

/// Compute the active segments for `user_id` from the joined view of the full
/// catalog. Output preserves the order of `rows`.
pub fn resolve_active_segments<I>(
  user_id: i64,
  rows: I,
  now: DateTime<Utc>,
) -> Result<Vec<ActiveSegment>>
where
  I: IntoIterator<Item = MembershipRow>,
{
  validate_user_id(user_id)?;

  Ok(
    rows
      .into_iter()
      .filter_map(|row| {
        assignment_for(user_id, &row, now)
          .map(|assignment| ActiveSegment { slug: row.slug, assignment })
      })
      .collect(),
  )
}
