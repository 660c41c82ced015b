//! Durable bot state backed by SQLite.
//!
//! Two tables: `posted`, the set of canonical URLs already sent to the
//! channel, and `kv`, small named values such as the previous alert line.
//! Access goes through [`tokio_rusqlite`], so every statement runs on the
//! connection's own thread and concurrent callers are serialised.

use std::path::Path;

use chrono::Utc;
#[cfg(test)]
use chrono::{DateTime, TimeZone};
use rusqlite::OptionalExtension as _;
use tracing::{debug, instrument};

use crate::error::Result;

/// Schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Insert-once: rows are never updated or deleted.
CREATE TABLE IF NOT EXISTS posted (
    url TEXT PRIMARY KEY,
    ts  INTEGER NOT NULL     -- unix seconds of the first notification
);

CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    val TEXT NOT NULL
);
";

/// Key under which the last observed alert line is kept.
pub const ALERTS_LINE_KEY: &str = "alerts_line";

/// Bot state stored in a single SQLite file.
///
/// Cloning is cheap; clones share the same connection.
#[derive(Clone)]
pub struct StateStore {
    conn: tokio_rusqlite::Connection,
}

impl StateStore {
    /// Open (or create) the store at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open(path).await?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory store, used by tests.
    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Whether `url` was already notified.
    pub async fn contains(&self, url: &str) -> Result<bool> {
        let url = url.to_owned();
        let found = self
            .conn
            .call(move |conn| {
                let found = conn
                    .query_row(
                        "SELECT 1 FROM posted WHERE url = ?1 LIMIT 1",
                        rusqlite::params![url],
                        |_| Ok(true),
                    )
                    .optional()?
                    .unwrap_or(false);
                Ok(found)
            })
            .await?;
        Ok(found)
    }

    /// Record `url` as notified. Marking an existing URL is a no-op and
    /// keeps its original timestamp.
    #[instrument(level = "debug", skip(self))]
    pub async fn mark_notified(&self, url: &str) -> Result<()> {
        let url = url.to_owned();
        let ts = Utc::now().timestamp();
        let inserted = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "INSERT OR IGNORE INTO posted (url, ts) VALUES (?1, ?2)",
                    rusqlite::params![url, ts],
                )?;
                Ok(n)
            })
            .await?;
        debug!(inserted, "Marked URL as notified");
        Ok(())
    }

    /// When `url` was first notified, if ever.
    #[cfg(test)]
    pub async fn notified_at(&self, url: &str) -> Result<Option<DateTime<Utc>>> {
        let url = url.to_owned();
        let ts: Option<i64> = self
            .conn
            .call(move |conn| {
                let ts = conn
                    .query_row(
                        "SELECT ts FROM posted WHERE url = ?1",
                        rusqlite::params![url],
                        |r| r.get(0),
                    )
                    .optional()?;
                Ok(ts)
            })
            .await?;
        Ok(ts.and_then(|ts| Utc.timestamp_opt(ts, 0).single()))
    }

    pub async fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_owned();
        let val = self
            .conn
            .call(move |conn| {
                let val = conn
                    .query_row(
                        "SELECT val FROM kv WHERE key = ?1",
                        rusqlite::params![key],
                        |r| r.get(0),
                    )
                    .optional()?;
                Ok(val)
            })
            .await?;
        Ok(val)
    }

    /// Insert or overwrite `key`.
    pub async fn kv_set(&self, key: &str, val: &str) -> Result<()> {
        let key = key.to_owned();
        let val = val.to_owned();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO kv (key, val) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET val = excluded.val",
                    rusqlite::params![key, val],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}
