//! Persistent nearest-neighbor store for watched movies.
//!
//! SQLite-backed, keyed by the content-derived movie id, searched by cosine
//! distance. The index directory is created on first use and survives
//! process restarts; re-ingestion is idempotent because writes are
//! at-most-once per id.
//!
//! Failure policy: [`VectorIndex::store`] reports a boolean (validation and
//! storage failures are caught and logged), [`VectorIndex::query`] degrades
//! to an empty result, and [`VectorIndex::get_by_id`] propagates database
//! failures to the caller.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, error, warn};

use crate::config::IndexConfig;
use crate::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use crate::error::{Error, Result};

/// The similarity metric fixed at index creation.
pub const COSINE_METRIC: &str = "cosine";

/// A stored record, as returned by [`VectorIndex::get_by_id`].
#[derive(Debug, Clone)]
pub struct MovieRecord {
    pub id: String,
    pub document: String,
    pub metadata: serde_json::Value,
    pub embedding: Vec<f32>,
}

/// A ranked search result from [`VectorIndex::query`].
#[derive(Debug, Clone)]
pub struct SimilarMovie {
    pub id: String,
    pub document: String,
    pub metadata: serde_json::Value,
    /// Cosine distance to the query vector; smaller = more similar.
    pub distance: f64,
}

/// Persistent cosine vector index over a single named collection.
#[derive(Debug)]
pub struct VectorIndex {
    pool: SqlitePool,
}

impl VectorIndex {
    /// Open (or create) the index at the configured directory.
    ///
    /// The distance metric and collection name are written into the index on
    /// creation and verified on every subsequent open; a mismatch is a
    /// configuration error, not a silent re-interpretation of stored vectors.
    pub async fn open(config: &IndexConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.path)?;
        let db_path = config.path.join("index.sqlite");

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        run_migrations(&pool).await?;
        verify_meta(&pool, &config.collection).await?;

        Ok(Self { pool })
    }

    /// Store one record. Returns `false` — never an error — when the
    /// metadata lacks the required `id` field or the underlying store fails.
    ///
    /// Writes are at-most-once per id: a record that already exists is left
    /// untouched.
    pub async fn store(
        &self,
        id: &str,
        document: &str,
        metadata: serde_json::Value,
        embedding: &[f32],
    ) -> bool {
        if metadata.get("id").and_then(|v| v.as_str()).is_none() {
            error!(document, "no id in metadata for record");
            return false;
        }

        match self.try_store(id, document, &metadata, embedding).await {
            Ok(()) => {
                debug!(id, "stored record");
                true
            }
            Err(e) => {
                error!(id, error = %e, "failed to store record");
                false
            }
        }
    }

    async fn try_store(
        &self,
        id: &str,
        document: &str,
        metadata: &serde_json::Value,
        embedding: &[f32],
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO movies (id, document, metadata_json, embedding, stored_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(document)
        .bind(metadata.to_string())
        .bind(vec_to_blob(embedding))
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Retrieve a record by id. `Ok(None)` is the normal absent result —
    /// dedup checks rely on it.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<MovieRecord>> {
        let row = sqlx::query("SELECT id, document, metadata_json, embedding FROM movies WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let metadata_json: String = row.get("metadata_json");
                let metadata = serde_json::from_str(&metadata_json)
                    .map_err(|e| Error::Storage(format!("corrupt metadata for {id}: {e}")))?;
                let blob: Vec<u8> = row.get("embedding");
                Ok(Some(MovieRecord {
                    id: row.get("id"),
                    document: row.get("document"),
                    metadata,
                    embedding: blob_to_vec(&blob),
                }))
            }
            None => Ok(None),
        }
    }

    /// Return up to `k` records ranked by ascending cosine distance to the
    /// query embedding, optionally restricted to records whose metadata
    /// matches every field of `filter`. On underlying failure, logs and
    /// returns an empty sequence.
    pub async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&serde_json::Map<String, serde_json::Value>>,
    ) -> Vec<SimilarMovie> {
        match self.try_query(embedding, k, filter).await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "similarity query failed");
                Vec::new()
            }
        }
    }

    async fn try_query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&serde_json::Map<String, serde_json::Value>>,
    ) -> Result<Vec<SimilarMovie>> {
        let rows = sqlx::query("SELECT id, document, metadata_json, embedding FROM movies")
            .fetch_all(&self.pool)
            .await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let metadata_json: String = row.get("metadata_json");
            let metadata: serde_json::Value = match serde_json::from_str(&metadata_json) {
                Ok(value) => value,
                Err(e) => {
                    warn!(error = %e, "skipping record with corrupt metadata");
                    continue;
                }
            };

            if let Some(filter) = filter {
                let matches = filter
                    .iter()
                    .all(|(key, expected)| metadata.get(key) == Some(expected));
                if !matches {
                    continue;
                }
            }

            let blob: Vec<u8> = row.get("embedding");
            let stored = blob_to_vec(&blob);
            results.push(SimilarMovie {
                id: row.get("id"),
                document: row.get("document"),
                metadata,
                distance: cosine_distance(embedding, &stored) as f64,
            });
        }

        results.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);
        Ok(results)
    }

    /// Total stored records.
    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM movies")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS movies (
            id TEXT PRIMARY KEY,
            document TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL,
            stored_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Pin the metric and collection name on first open; reject mismatches on
/// later opens.
async fn verify_meta(pool: &SqlitePool, collection: &str) -> Result<()> {
    let existing_metric: Option<String> =
        sqlx::query_scalar("SELECT value FROM index_meta WHERE key = 'metric'")
            .fetch_optional(pool)
            .await?;

    match existing_metric {
        None => {
            sqlx::query("INSERT INTO index_meta (key, value) VALUES ('metric', ?), ('collection', ?)")
                .bind(COSINE_METRIC)
                .bind(collection)
                .execute(pool)
                .await?;
        }
        Some(metric) if metric == COSINE_METRIC => {
            let existing_collection: Option<String> =
                sqlx::query_scalar("SELECT value FROM index_meta WHERE key = 'collection'")
                    .fetch_optional(pool)
                    .await?;
            if let Some(existing) = existing_collection {
                if existing != collection {
                    return Err(Error::Config(format!(
                        "index holds collection '{existing}', requested '{collection}'"
                    )));
                }
            }
        }
        Some(metric) => {
            return Err(Error::Config(format!(
                "index was created with metric '{metric}', requested '{COSINE_METRIC}'"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn config_at(path: &Path) -> IndexConfig {
        IndexConfig {
            path: path.to_path_buf(),
            collection: "watched_movies".to_string(),
        }
    }

    async fn open_temp_index() -> (TempDir, VectorIndex) {
        let tmp = TempDir::new().unwrap();
        let index = VectorIndex::open(&config_at(tmp.path())).await.unwrap();
        (tmp, index)
    }

    fn metadata(id: &str, era: &str) -> serde_json::Value {
        serde_json::json!({ "id": id, "title": id, "era": era })
    }

    #[tokio::test]
    async fn test_store_and_get_roundtrip() {
        let (_tmp, index) = open_temp_index().await;

        let stored = index
            .store(
                "inception-2010",
                "Inception",
                metadata("inception-2010", "2010s modern film"),
                &[0.1, 0.2, 0.3],
            )
            .await;
        assert!(stored);

        let record = index.get_by_id("inception-2010").await.unwrap().unwrap();
        assert_eq!(record.document, "Inception");
        assert_eq!(record.metadata["era"], "2010s modern film");
        assert_eq!(record.embedding, vec![0.1, 0.2, 0.3]);

        assert!(index.get_by_id("unknown").await.unwrap().is_none());
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_store_rejects_metadata_without_id() {
        let (_tmp, index) = open_temp_index().await;

        let stored = index
            .store(
                "inception-2010",
                "Inception",
                serde_json::json!({ "title": "Inception" }),
                &[0.1, 0.2],
            )
            .await;
        assert!(!stored);
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_is_at_most_once_per_id() {
        let (_tmp, index) = open_temp_index().await;

        assert!(
            index
                .store("matrix-1999", "The Matrix", metadata("matrix-1999", "1990s film"), &[1.0, 0.0])
                .await
        );
        // Second write with different content must not clobber the first.
        assert!(
            index
                .store("matrix-1999", "Not The Matrix", metadata("matrix-1999", "2000s film"), &[0.0, 1.0])
                .await
        );

        assert_eq!(index.count().await.unwrap(), 1);
        let record = index.get_by_id("matrix-1999").await.unwrap().unwrap();
        assert_eq!(record.document, "The Matrix");
        assert_eq!(record.embedding, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_query_ranks_by_ascending_distance() {
        let (_tmp, index) = open_temp_index().await;

        index
            .store("a", "A", metadata("a", "1990s film"), &[1.0, 0.0])
            .await;
        index
            .store("b", "B", metadata("b", "1990s film"), &[0.9, 0.1])
            .await;
        index
            .store("c", "C", metadata("c", "2000s film"), &[0.0, 1.0])
            .await;

        let results = index.query(&[1.0, 0.0], 5, None).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id, "a");
        assert_eq!(results[1].id, "b");
        assert_eq!(results[2].id, "c");
        assert!(results[0].distance <= results[1].distance);
        assert!(results[1].distance <= results[2].distance);

        let top_one = index.query(&[1.0, 0.0], 1, None).await;
        assert_eq!(top_one.len(), 1);
        assert_eq!(top_one[0].id, "a");
    }

    #[tokio::test]
    async fn test_query_metadata_filter() {
        let (_tmp, index) = open_temp_index().await;

        index
            .store("a", "A", metadata("a", "1990s film"), &[1.0, 0.0])
            .await;
        index
            .store("c", "C", metadata("c", "2000s film"), &[0.99, 0.01])
            .await;

        let mut filter = serde_json::Map::new();
        filter.insert("era".to_string(), serde_json::json!("2000s film"));

        let results = index.query(&[1.0, 0.0], 5, Some(&filter)).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "c");
    }

    #[tokio::test]
    async fn test_index_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let config = config_at(tmp.path());

        {
            let index = VectorIndex::open(&config).await.unwrap();
            index
                .store("a", "A", metadata("a", "1990s film"), &[1.0, 0.0])
                .await;
        }

        let reopened = VectorIndex::open(&config).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_collection_mismatch_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let config = config_at(tmp.path());
        VectorIndex::open(&config).await.unwrap();

        let other = IndexConfig {
            path: tmp.path().to_path_buf(),
            collection: "something_else".to_string(),
        };
        let err = VectorIndex::open(&other).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
