//! libSQL-backed URL content cache.
//!
//! The [`FetchCache`] short-circuits re-fetching identical URLs within a run
//! or across runs. Entries are keyed by URL and expire after a TTL checked
//! at read time; a hit reports the original cache write time so fetch
//! results can carry an honest `fetched_at`.
//!
//! Entries are immutable once written, so concurrent duplicate writes are
//! benign and no locking beyond libSQL's own is needed.

mod migrations;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use sha2::{Digest, Sha256};
use tracing::debug;

use docscout_shared::{DocScoutError, Result};

/// A cached fetch body with its provenance.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub url: String,
    pub content: String,
    /// SHA-256 of `content`, hex-encoded.
    pub content_hash: String,
    /// When the entry was written.
    pub stored_at: DateTime<Utc>,
}

/// Primary cache handle wrapping a local libSQL database.
pub struct FetchCache {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl FetchCache {
    /// Open or create a cache database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DocScoutError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DocScoutError::Cache(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| DocScoutError::Cache(e.to_string()))?;

        let cache = Self { db, conn };
        cache.run_migrations().await?;
        Ok(cache)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    DocScoutError::Cache(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Look up a URL, honoring the TTL. Expired entries read as misses.
    pub async fn get(&self, url: &str, ttl: Duration) -> Result<Option<CacheEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT url, content, content_hash, stored_at FROM fetch_cache WHERE url = ?1",
                params![url],
            )
            .await
            .map_err(|e| DocScoutError::Cache(e.to_string()))?;

        let row = match rows.next().await {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e) => return Err(DocScoutError::Cache(e.to_string())),
        };

        let entry = CacheEntry {
            url: row
                .get::<String>(0)
                .map_err(|e| DocScoutError::Cache(e.to_string()))?,
            content: row
                .get::<String>(1)
                .map_err(|e| DocScoutError::Cache(e.to_string()))?,
            content_hash: row
                .get::<String>(2)
                .map_err(|e| DocScoutError::Cache(e.to_string()))?,
            stored_at: parse_timestamp(
                &row.get::<String>(3)
                    .map_err(|e| DocScoutError::Cache(e.to_string()))?,
            )?,
        };

        let age = Utc::now().signed_duration_since(entry.stored_at);
        if age.num_milliseconds() < 0 || age.to_std().unwrap_or(Duration::MAX) > ttl {
            debug!(%url, stored_at = %entry.stored_at, "cache entry expired");
            return Ok(None);
        }

        debug!(%url, "cache hit");
        Ok(Some(entry))
    }

    /// Store a fetch body. Replaces any prior entry for the URL.
    pub async fn put(&self, url: &str, content: &str) -> Result<()> {
        let hash = content_hash(content);
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO fetch_cache (url, content, content_hash, stored_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(url) DO UPDATE SET
                   content = excluded.content,
                   content_hash = excluded.content_hash,
                   stored_at = excluded.stored_at",
                params![url, content, hash.as_str(), now.as_str()],
            )
            .await
            .map_err(|e| DocScoutError::Cache(e.to_string()))?;
        Ok(())
    }

    /// Delete entries older than `ttl`. Returns the number removed.
    pub async fn purge_expired(&self, ttl: Duration) -> Result<u64> {
        let cutoff = (Utc::now()
            - chrono::Duration::from_std(ttl)
                .map_err(|e| DocScoutError::Cache(e.to_string()))?)
        .to_rfc3339();

        let removed = self
            .conn
            .execute(
                "DELETE FROM fetch_cache WHERE stored_at < ?1",
                params![cutoff.as_str()],
            )
            .await
            .map_err(|e| DocScoutError::Cache(e.to_string()))?;

        Ok(removed)
    }
}

/// Compute the SHA-256 hex digest of a body.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DocScoutError::Cache(format!("bad stored_at '{raw}': {e}")))
}
