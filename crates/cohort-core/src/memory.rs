//! [`MemoryStore`], an in-process [`SegmentStore`] with the same contract as
//! the SQLite backend. Used for tests and for running without a database.

use std::{
  collections::{BTreeMap, HashSet},
  sync::{Mutex, PoisonError, RwLock, RwLockWriteGuard},
};

use chrono::{DateTime, Utc};

use crate::{
  Error, Result,
  history::{HistoryEntry, Operation},
  segment::{MembershipRow, Segment},
  store::{SegmentStore, month_bounds},
  update::MembershipBatch,
};

#[derive(Debug, Clone, Default)]
struct State {
  /// slug → auto_percent
  segments:        BTreeMap<String, Option<u8>>,
  /// (user_id, slug) → expires_at
  memberships:     BTreeMap<(i64, String), Option<DateTime<Utc>>>,
  history:         Vec<HistoryEntry>,
  last_history_id: i64,
}

impl State {
  fn record(
    &mut self,
    user_id: i64,
    slug: &str,
    operation: Operation,
    recorded_at: DateTime<Utc>,
  ) {
    self.last_history_id += 1;
    self.history.push(HistoryEntry {
      id: self.last_history_id,
      user_id,
      segment_slug: slug.to_owned(),
      operation,
      recorded_at,
    });
  }

  fn insert(&mut self, user_id: i64, slug: &str, expires_at: Option<DateTime<Utc>>) -> Result<()> {
    if !self.segments.contains_key(slug) {
      return Err(Error::InsertFailed(format!("no segment {slug:?}").into()));
    }
    self.memberships.insert((user_id, slug.to_owned()), expires_at);
    Ok(())
  }
}

/// A lock-protected in-memory segment store.
#[derive(Debug, Default)]
pub struct MemoryStore {
  state:           RwLock<State>,
  failing_inserts: Mutex<HashSet<String>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// Make every later membership insert for `slug` fail, as a database
  /// constraint or I/O error would.
  /// Recovers the set if its lock was poisoned.
  pub fn fail_inserts_of(&self, slug: impl Into<String>) {
    self
      .failing_inserts
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(slug.into());
  }

  fn insert_should_fail(&self, slug: &str) -> bool {
    self
      .failing_inserts
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .contains(slug)
  }

  fn read<T>(&self, f: impl FnOnce(&State) -> T) -> Result<T> {
    let state = self.state.read().map_err(|_| poisoned())?;
    Ok(f(&state))
  }

  fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
    self.state.write().map_err(|_| poisoned())
  }
}

fn poisoned() -> Error { Error::Storage("memory store lock poisoned".into()) }

// ─── SegmentStore impl ───────────────────────────────────────────────────────

impl SegmentStore for MemoryStore {
  type Error = Error;

  async fn create_segment(&self, slug: String, auto_percent: Option<u8>) -> Result<Segment> {
    let mut state = self.write()?;
    if state.segments.contains_key(&slug) {
      return Err(Error::DuplicateSlug(slug));
    }
    state.segments.insert(slug.clone(), auto_percent);
    Ok(Segment { slug, auto_percent })
  }

  async fn delete_segment(&self, slug: String) -> Result<bool> {
    let mut state = self.write()?;
    if state.segments.remove(&slug).is_none() {
      return Ok(false);
    }
    state.memberships.retain(|(_, s), _| *s != slug);
    Ok(true)
  }

  async fn segment_exists(&self, slug: String) -> Result<bool> {
    self.read(|state| state.segments.contains_key(&slug))
  }

  async fn list_segments(&self) -> Result<Vec<String>> {
    self.read(|state| state.segments.keys().cloned().collect())
  }

  async fn membership_view(&self, user_id: i64) -> Result<Vec<MembershipRow>> {
    self.read(|state| {
      state
        .segments
        .iter()
        .map(|(slug, &auto_percent)| {
          match state.memberships.get(&(user_id, slug.clone())) {
            Some(&expires_at) => MembershipRow::manual(slug.clone(), auto_percent, expires_at),
            None => MembershipRow::rollout_only(slug.clone(), auto_percent),
          }
        })
        .collect()
    })
  }

  async fn insert_membership(&self, user_id: i64, slug: String) -> Result<()> {
    if self.insert_should_fail(&slug) {
      return Err(Error::InsertFailed(format!("injected failure for {slug:?}").into()));
    }
    let mut state = self.write()?;
    if state.memberships.contains_key(&(user_id, slug.clone())) {
      return Err(Error::InsertFailed(
        format!("user {user_id} is already in segment {slug:?}").into(),
      ));
    }
    state.insert(user_id, &slug, None)
  }

  async fn apply_membership_batch(&self, batch: MembershipBatch) -> Result<()> {
    let mut state = self.write()?;
    // Work on a copy; it replaces the live state only once every step succeeded.
    let mut next = state.clone();

    for slug in &batch.remove {
      next.memberships.remove(&(batch.user_id, slug.clone()));
      next.record(batch.user_id, slug, Operation::Removed, batch.recorded_at);
    }
    for slug in &batch.add {
      if self.insert_should_fail(slug) {
        return Err(Error::InsertFailed(format!("injected failure for {slug:?}").into()));
      }
      next.insert(batch.user_id, slug, batch.expires_at)?;
      next.record(batch.user_id, slug, Operation::Added, batch.recorded_at);
    }

    *state = next;
    Ok(())
  }

  async fn list_history(&self) -> Result<Vec<HistoryEntry>> {
    self.read(|state| state.history.clone())
  }

  async fn list_history_for_month(&self, year: i32, month: u32) -> Result<Vec<HistoryEntry>> {
    let (start, end) = month_bounds(year, month).ok_or(Error::InvalidMonth(month))?;
    self.read(|state| {
      let mut entries: Vec<_> = state
        .history
        .iter()
        .filter(|e| e.recorded_at >= start && e.recorded_at < end)
        .cloned()
        .collect();
      entries.sort_by_key(|e| (e.recorded_at, e.id));
      entries
    })
  }
}
