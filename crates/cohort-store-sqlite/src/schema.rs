//! SQL schema for the Cohort SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS segments (
    slug         TEXT PRIMARY KEY,
    auto_percent INTEGER CHECK (auto_percent BETWEEN 0 AND 100)
);

-- Row existence means manual assignment; NULL expires_at means permanent.
CREATE TABLE IF NOT EXISTS user_segments (
    user_id      INTEGER NOT NULL,
    segment_slug TEXT    NOT NULL REFERENCES segments(slug) ON DELETE CASCADE,
    expires_at   TEXT,            -- RFC 3339 UTC or NULL
    PRIMARY KEY (user_id, segment_slug)
);

-- Strictly append-only. No UPDATE or DELETE is ever issued against this table.
-- No foreign key: the audit trail outlives deleted segments.
CREATE TABLE IF NOT EXISTS user_segment_history (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id      INTEGER NOT NULL,
    segment_slug TEXT    NOT NULL,
    operation    TEXT    NOT NULL CHECK (operation IN ('ADDED', 'REMOVED')),
    recorded_at  TEXT    NOT NULL   -- RFC 3339 UTC, fixed width
);

CREATE INDEX IF NOT EXISTS user_segments_user_idx ON user_segments(user_id);
CREATE INDEX IF NOT EXISTS history_recorded_idx   ON user_segment_history(recorded_at);

PRAGMA user_version = 1;
";
