//! The append-only membership audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The kind of manual membership change a history entry records.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
  Added,
  Removed,
}

/// One applied add or remove. Never updated or deleted after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
  /// Store-assigned, increasing in insertion order.
  pub id:           i64,
  pub user_id:      i64,
  pub segment_slug: String,
  pub operation:    Operation,
  pub recorded_at:  DateTime<Utc>,
}
