//! Error types for `cohort-core`.

use thiserror::Error;

/// A boxed underlying cause from a storage backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  // ── Validation ────────────────────────────────────────────────────────

  #[error("slug cannot be empty")]
  EmptySlug,

  #[error("slug length must be between 3 and 50 characters")]
  SlugLength,

  #[error("slug must contain only latin letters, digits, and underscores")]
  SlugFormat,

  #[error("auto_percent must not be negative")]
  PercentBelowZero,

  #[error("auto_percent must not exceed 100")]
  PercentAboveHundred,

  #[error("user id must be positive")]
  InvalidUserId,

  #[error("cannot update more than 100 segments in one request")]
  TooManySegments,

  #[error("month must be between 1 and 12, got {0}")]
  InvalidMonth(u32),

  #[error("year {0} is earlier than the minimum allowed year (2000)")]
  YearTooEarly(i32),

  #[error(
    "report period {year:04}-{month:02} is the current or a future month"
  )]
  PeriodNotElapsed { year: i32, month: u32 },

  // ── Conflicts ─────────────────────────────────────────────────────────

  #[error("segment {0:?} cannot be in both the add and remove lists")]
  SegmentConflict(String),

  #[error("segment {0:?} already exists")]
  DuplicateSlug(String),

  // ── Not found ─────────────────────────────────────────────────────────

  #[error("segment {0:?} not found")]
  SlugNotFound(String),

  // ── Storage ───────────────────────────────────────────────────────────

  #[error("failed to begin transaction: {0}")]
  TransactionBeginFailed(#[source] BoxError),

  #[error("failed to commit transaction: {0}")]
  TransactionCommitFailed(#[source] BoxError),

  #[error("cannot insert into table: {0}")]
  InsertFailed(#[source] BoxError),

  #[error("failed to remove from table: {0}")]
  DeleteFailed(#[source] BoxError),

  #[error("storage error: {0}")]
  Storage(#[source] BoxError),
}

impl Error {
  /// Bad input detected before any storage access.
  pub fn is_validation(&self) -> bool {
    matches!(
      self,
      Self::EmptySlug
        | Self::SlugLength
        | Self::SlugFormat
        | Self::PercentBelowZero
        | Self::PercentAboveHundred
        | Self::InvalidUserId
        | Self::TooManySegments
        | Self::InvalidMonth(_)
        | Self::YearTooEarly(_)
        | Self::PeriodNotElapsed { .. }
    )
  }

  pub fn is_conflict(&self) -> bool {
    matches!(self, Self::SegmentConflict(_) | Self::DuplicateSlug(_))
  }

  pub fn is_not_found(&self) -> bool { matches!(self, Self::SlugNotFound(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
