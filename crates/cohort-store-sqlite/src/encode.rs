//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with a fixed microsecond
//! precision and a `Z` suffix, so that lexical order is chronological order
//! and range queries can compare the text directly.

use std::str::FromStr as _;

use chrono::{DateTime, SecondsFormat, Utc};
use cohort_core::{
  history::{HistoryEntry, Operation},
  segment::MembershipRow,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Operation ───────────────────────────────────────────────────────────────

pub fn encode_operation(op: Operation) -> String { op.to_string() }

pub fn decode_operation(s: &str) -> Result<Operation> {
  Operation::from_str(s).map_err(|_| Error::Decode(format!("unknown operation: {s:?}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// A `segments` row left-joined with the user's `user_segments` row.
pub struct RawMembershipRow {
  pub slug:         String,
  pub auto_percent: Option<u8>,
  pub expires_at:   Option<String>,
  pub is_manual:    bool,
}

impl RawMembershipRow {
  pub fn into_row(self) -> Result<MembershipRow> {
    Ok(MembershipRow {
      slug:         self.slug,
      auto_percent: self.auto_percent,
      expires_at:   self.expires_at.as_deref().map(decode_dt).transpose()?,
      is_manual:    self.is_manual,
    })
  }
}

/// Raw columns of a `user_segment_history` row.
pub struct RawHistoryEntry {
  pub id:           i64,
  pub user_id:      i64,
  pub segment_slug: String,
  pub operation:    String,
  pub recorded_at:  String,
}

impl RawHistoryEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      user_id:      row.get(1)?,
      segment_slug: row.get(2)?,
      operation:    row.get(3)?,
      recorded_at:  row.get(4)?,
    })
  }

  pub fn into_entry(self) -> Result<HistoryEntry> {
    Ok(HistoryEntry {
      id:           self.id,
      user_id:      self.user_id,
      segment_slug: self.segment_slug,
      operation:    decode_operation(&self.operation)?,
      recorded_at:  decode_dt(&self.recorded_at)?,
    })
  }
}
