//! Segment types: the catalog entry, the per-user membership view, and the
//! resolved descriptor of an active segment.
//!
//! Manual membership is modelled by row existence. A user with no row for a
//! segment may still be in it through percentage rollout, which is derived on
//! read and never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// A named cohort. The slug is unique and immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
  pub slug:         String,
  /// Share of users (0–100) automatically placed in the segment.
  pub auto_percent: Option<u8>,
}

// ─── Membership view ─────────────────────────────────────────────────────────

/// One segment of the catalog as seen by a single user: the segment's rollout
/// configuration joined with the user's manual assignment, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRow {
  pub slug:         String,
  pub auto_percent: Option<u8>,
  /// Only meaningful when `is_manual`; `None` means a permanent assignment.
  pub expires_at:   Option<DateTime<Utc>>,
  pub is_manual:    bool,
}

impl MembershipRow {
  /// A catalog segment the user was never manually assigned to.
  pub fn rollout_only(slug: impl Into<String>, auto_percent: Option<u8>) -> Self {
    Self { slug: slug.into(), auto_percent, expires_at: None, is_manual: false }
  }

  /// A catalog segment the user was manually assigned to.
  pub fn manual(
    slug: impl Into<String>,
    auto_percent: Option<u8>,
    expires_at: Option<DateTime<Utc>>,
  ) -> Self {
    Self { slug: slug.into(), auto_percent, expires_at, is_manual: true }
  }
}

// ─── Resolved ────────────────────────────────────────────────────────────────

/// Why a segment is active for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Assignment {
  /// Explicitly assigned; `expires_at` is still in the future, or absent.
  Manual { expires_at: Option<DateTime<Utc>> },
  /// The user's bucket falls under the segment's rollout percentage.
  Rollout { auto_percent: u8, bucket: u8 },
}

/// A segment that is currently active for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSegment {
  pub slug:       String,
  pub assignment: Assignment,
}
