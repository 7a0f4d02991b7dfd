use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tracing::info;

use crate::parser::DrawAggregate;

/// Fixed key the snapshot is stored under.
pub const CACHE_KEY: &str = "draw-aggregates";
pub const FRESHNESS_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("snapshot timestamp out of range: {0}")]
    Timestamp(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub fetched_at: DateTime<Utc>,
    pub data: BTreeMap<NaiveDate, DrawAggregate>,
}

/// SQLite-backed store for the latest snapshot of parsed draws.
pub struct SnapshotCache {
    conn: Connection,
    freshness: Duration,
}

impl SnapshotCache {
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        info!(action = "open", component = "snapshot_cache", path = ?path, "Opening snapshot cache");
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS snapshots (
                cache_key TEXT PRIMARY KEY,
                fetched_at INTEGER NOT NULL,
                data TEXT NOT NULL
            )",
        )?;
        Ok(Self {
            conn,
            freshness: Duration::hours(FRESHNESS_HOURS),
        })
    }

    pub fn save(
        &self,
        data: &BTreeMap<NaiveDate, DrawAggregate>,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let start_time = Instant::now();
        let encoded = serde_json::to_string(data)?;
        self.conn.execute(
            "INSERT INTO snapshots (cache_key, fetched_at, data) VALUES (?1, ?2, ?3)
             ON CONFLICT(cache_key) DO UPDATE SET fetched_at = excluded.fetched_at, data = excluded.data",
            params![CACHE_KEY, fetched_at.timestamp_millis(), encoded],
        )?;

        info!(
            action = "save",
            component = "snapshot_cache",
            draw_count = data.len(),
            bytes = encoded.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "Snapshot saved"
        );
        Ok(())
    }

    /// The stored snapshot, unless it is missing or older than the freshness
    /// window relative to `now`.
    pub fn load(&self, now: DateTime<Utc>) -> Result<Option<Snapshot>, CacheError> {
        let start_time = Instant::now();
        let row: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT fetched_at, data FROM snapshots WHERE cache_key = ?1",
                [CACHE_KEY],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((millis, encoded)) = row else {
            info!(action = "load", component = "snapshot_cache", "No snapshot stored");
            return Ok(None);
        };

        let fetched_at = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or(CacheError::Timestamp(millis))?;
        let age = now - fetched_at;
        if age >= self.freshness {
            info!(
                action = "load",
                component = "snapshot_cache",
                age_minutes = age.num_minutes(),
                "Snapshot is stale"
            );
            return Ok(None);
        }

        let data: BTreeMap<NaiveDate, DrawAggregate> = serde_json::from_str(&encoded)?;
        info!(
            action = "load",
            component = "snapshot_cache",
            draw_count = data.len(),
            age_minutes = age.num_minutes(),
            duration_ms = start_time.elapsed().as_millis(),
            "Snapshot loaded"
        );
        Ok(Some(Snapshot { fetched_at, data }))
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        self.conn
            .execute("DELETE FROM snapshots WHERE cache_key = ?1", [CACHE_KEY])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_draw;

    fn sample() -> BTreeMap<NaiveDate, DrawAggregate> {
        let date = NaiveDate::from_ymd_opt(2020, 1, 16).unwrap();
        let agg = parse_draw(date, "hdr\nFIRST 123456\nTWO 12 34").unwrap();
        BTreeMap::from([(date, agg)])
    }

    #[test]
    fn fresh_snapshot_loads() {
        let cache = SnapshotCache::open_in_memory().unwrap();
        let saved_at = Utc::now();
        cache.save(&sample(), saved_at).unwrap();

        let snapshot = cache.load(saved_at + Duration::hours(23)).unwrap().unwrap();
        assert_eq!(snapshot.data, sample());
        assert_eq!(snapshot.fetched_at.timestamp_millis(), saved_at.timestamp_millis());
    }

    #[test]
    fn stale_snapshot_is_absent() {
        let cache = SnapshotCache::open_in_memory().unwrap();
        let saved_at = Utc::now();
        cache.save(&sample(), saved_at).unwrap();
        assert!(cache.load(saved_at + Duration::hours(24)).unwrap().is_none());
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let cache = SnapshotCache::open_in_memory().unwrap();
        let saved_at = Utc::now();
        cache.save(&BTreeMap::new(), saved_at).unwrap();
        cache.save(&sample(), saved_at).unwrap();
        assert_eq!(cache.load(saved_at).unwrap().unwrap().data.len(), 1);
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let cache = SnapshotCache::open_in_memory().unwrap();
        cache
            .conn
            .execute(
                "INSERT INTO snapshots (cache_key, fetched_at, data) VALUES (?1, ?2, 'not json')",
                params![CACHE_KEY, Utc::now().timestamp_millis()],
            )
            .unwrap();
        assert!(matches!(cache.load(Utc::now()), Err(CacheError::Encoding(_))));
    }

    #[test]
    fn persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let saved_at = Utc::now();
        SnapshotCache::open(&path).unwrap().save(&sample(), saved_at).unwrap();

        let reopened = SnapshotCache::open(&path).unwrap();
        assert_eq!(reopened.load(saved_at).unwrap().unwrap().data, sample());
        reopened.clear().unwrap();
        assert!(reopened.load(saved_at).unwrap().is_none());
    }
}
