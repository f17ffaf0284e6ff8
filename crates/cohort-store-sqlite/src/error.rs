//! Error type for `cohort-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] cohort_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unexpected column value: {0}")]
  Decode(String),

  #[error("segment {0:?} already exists")]
  DuplicateSlug(String),

  // ── Per-step failures inside a membership batch ───────────────────────

  #[error("failed to begin transaction: {0}")]
  TransactionBegin(#[source] rusqlite::Error),

  #[error("failed to commit transaction: {0}")]
  TransactionCommit(#[source] rusqlite::Error),

  #[error("cannot insert into table: {0}")]
  Insert(#[source] rusqlite::Error),

  #[error("failed to remove from table: {0}")]
  Delete(#[source] rusqlite::Error),

  #[error("membership batch abandoned by the caller before commit")]
  Abandoned,
}

impl From<Error> for cohort_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::Core(e) => e,
      Error::DuplicateSlug(slug) => Self::DuplicateSlug(slug),
      Error::TransactionBegin(e) => Self::TransactionBeginFailed(Box::new(e)),
      Error::TransactionCommit(e) => Self::TransactionCommitFailed(Box::new(e)),
      Error::Insert(e) => Self::InsertFailed(Box::new(e)),
      Error::Delete(e) => Self::DeleteFailed(Box::new(e)),
      other => Self::Storage(Box::new(other)),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
