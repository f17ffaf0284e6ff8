//! [`SqliteStore`], the SQLite implementation of [`SegmentStore`].

use std::{
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use rusqlite::{ErrorCode, OptionalExtension as _, ffi};

use cohort_core::{
  history::{HistoryEntry, Operation},
  segment::{MembershipRow, Segment},
  store::{SegmentStore, month_bounds},
  update::MembershipBatch,
};

use crate::{
  Error, Result,
  encode::{RawHistoryEntry, RawMembershipRow, encode_dt, encode_operation},
  schema::SCHEMA,
};

const HISTORY_COLUMNS: &str =
  "SELECT id, user_id, segment_slug, operation, recorded_at FROM user_segment_history";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A segment store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All calls
/// are serialised on the connection's thread. A membership batch runs there
/// inside one transaction and is rolled back if the caller's future is
/// dropped before the commit.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// A primary-key or unique constraint violation.
fn is_uniqueness_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _)
      if e.code == ErrorCode::ConstraintViolation
        && (e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
          || e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE)
  )
}

/// Raises the shared flag when dropped, which happens when the future owning
/// it completes or is abandoned.
struct AbandonOnDrop(Arc<AtomicBool>);

impl Drop for AbandonOnDrop {
  fn drop(&mut self) { self.0.store(true, Ordering::Release); }
}

fn ensure_wanted(abandoned: &AtomicBool) -> Result<()> {
  if abandoned.load(Ordering::Acquire) {
    return Err(Error::Abandoned);
  }
  Ok(())
}

/// Run every step of `batch` inside one transaction.
///
/// The transaction rolls back when dropped, so every early return undoes
/// whatever the batch had already written. `abandoned` is checked before
/// every statement and before the commit.
fn apply_batch(
  conn: &mut rusqlite::Connection,
  batch: &MembershipBatch,
  abandoned: &AtomicBool,
) -> Result<()> {
  ensure_wanted(abandoned)?;
  let tx = conn.transaction().map_err(Error::TransactionBegin)?;
  let recorded_at = encode_dt(batch.recorded_at);
  let expires_at = batch.expires_at.map(encode_dt);

  {
    let mut remove = tx
      .prepare_cached("DELETE FROM user_segments WHERE user_id = ?1 AND segment_slug = ?2")
      .map_err(Error::Delete)?;
    let mut add = tx
      .prepare_cached(
        "INSERT INTO user_segments (user_id, segment_slug, expires_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (user_id, segment_slug)
         DO UPDATE SET expires_at = excluded.expires_at",
      )
      .map_err(Error::Insert)?;
    let mut history = tx
      .prepare_cached(
        "INSERT INTO user_segment_history (user_id, segment_slug, operation, recorded_at)
         VALUES (?1, ?2, ?3, ?4)",
      )
      .map_err(Error::Insert)?;

    let removed = encode_operation(Operation::Removed);
    for slug in &batch.remove {
      ensure_wanted(abandoned)?;
      remove
        .execute(rusqlite::params![batch.user_id, slug])
        .map_err(Error::Delete)?;
      history
        .execute(rusqlite::params![batch.user_id, slug, removed, recorded_at])
        .map_err(Error::Insert)?;
    }

    let added = encode_operation(Operation::Added);
    for slug in &batch.add {
      ensure_wanted(abandoned)?;
      add
        .execute(rusqlite::params![batch.user_id, slug, expires_at])
        .map_err(Error::Insert)?;
      history
        .execute(rusqlite::params![batch.user_id, slug, added, recorded_at])
        .map_err(Error::Insert)?;
    }
  }

  ensure_wanted(abandoned)?;
  tx.commit().map_err(Error::TransactionCommit)
}

// ─── SegmentStore impl ───────────────────────────────────────────────────────

impl SegmentStore for SqliteStore {
  type Error = Error;

  // ── Catalog ───────────────────────────────────────────────────────────────

  async fn create_segment(&self, slug: String, auto_percent: Option<u8>) -> Result<Segment> {
    self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO segments (slug, auto_percent) VALUES (?1, ?2)",
          rusqlite::params![slug, auto_percent],
        );
        match inserted {
          Ok(_) => Ok(Ok(Segment { slug, auto_percent })),
          Err(e) if is_uniqueness_violation(&e) => Ok(Err(Error::DuplicateSlug(slug))),
          Err(e) => Err(e.into()),
        }
      })
      .await?
  }

  async fn delete_segment(&self, slug: String) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM segments WHERE slug = ?1", rusqlite::params![slug])?)
      })
      .await?;
    Ok(deleted > 0)
  }

  async fn segment_exists(&self, slug: String) -> Result<bool> {
    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM segments WHERE slug = ?1",
              rusqlite::params![slug],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(exists)
  }

  async fn list_segments(&self) -> Result<Vec<String>> {
    let slugs = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT slug FROM segments ORDER BY slug")?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(slugs)
  }

  // ── Memberships ───────────────────────────────────────────────────────────

  async fn membership_view(&self, user_id: i64) -> Result<Vec<MembershipRow>> {
    let raws: Vec<RawMembershipRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT
             s.slug,
             s.auto_percent,
             us.expires_at,
             us.user_id IS NOT NULL AS is_manual
           FROM segments s
           LEFT JOIN user_segments us
             ON us.segment_slug = s.slug AND us.user_id = ?1
           ORDER BY s.slug",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_id], |row| {
            Ok(RawMembershipRow {
              slug:         row.get(0)?,
              auto_percent: row.get(1)?,
              expires_at:   row.get(2)?,
              is_manual:    row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMembershipRow::into_row).collect()
  }

  async fn insert_membership(&self, user_id: i64, slug: String) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO user_segments (user_id, segment_slug) VALUES (?1, ?2)",
          rusqlite::params![user_id, slug],
        );
        Ok(inserted.map(|_| ()).map_err(Error::Insert))
      })
      .await?
  }

  async fn apply_membership_batch(&self, batch: MembershipBatch) -> Result<()> {
    let abandoned = Arc::new(AtomicBool::new(false));
    let _guard = AbandonOnDrop(Arc::clone(&abandoned));
    self
      .conn
      .call(move |conn| Ok(apply_batch(conn, &batch, &abandoned)))
      .await?
  }

  // ── History ───────────────────────────────────────────────────────────────

  async fn list_history(&self) -> Result<Vec<HistoryEntry>> {
    let raws: Vec<RawHistoryEntry> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!("{HISTORY_COLUMNS} ORDER BY id"))?;
        let rows = stmt
          .query_map([], RawHistoryEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHistoryEntry::into_entry).collect()
  }

  async fn list_history_for_month(&self, year: i32, month: u32) -> Result<Vec<HistoryEntry>> {
    let (start, end) =
      month_bounds(year, month).ok_or(cohort_core::Error::InvalidMonth(month))?;
    let start_str = encode_dt(start);
    let end_str = encode_dt(end);

    let raws: Vec<RawHistoryEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "{HISTORY_COLUMNS}
           WHERE recorded_at >= ?1 AND recorded_at < ?2
           ORDER BY recorded_at, id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![start_str, end_str], RawHistoryEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHistoryEntry::into_entry).collect()
  }
}
