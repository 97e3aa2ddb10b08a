//! The versioned content store.
//!
//! Four append-only partitions of immutable records with generated ids:
//! originals, AI drafts, reviews, and final versions. Cross-partition
//! joins always go through explicit lineage keys in record metadata
//! (`original_id` / `content_id`) — a partition may hold zero, one, or
//! many records per lineage key.
//!
//! Operations are atomic at single-record granularity on a shared
//! connection pool; there are no cross-record transactions, and
//! concurrent stores for different lineage keys do not block each
//! other. Persistence failures surface as [`Error::Storage`]; missing
//! records are `Ok(None)`, never errors.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::error::Error;
use crate::migrate;
use crate::models::{
    ContentHistory, Partition, PublicationRequirements, ReviewReport, ScrapedPage, SearchHit,
    StoredRecord,
};
use crate::search::{self, SearchMode};

pub struct ContentStore {
    pool: SqlitePool,
    config: Config,
}

impl ContentStore {
    /// Open (or create) the store. Migrations run on every connect, so
    /// partitions exist by the time any operation touches them.
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        let pool = db::connect(&config.db.path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self {
            pool,
            config: config.clone(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Persist a record: fresh UUID, creation timestamp, body + flat
    /// metadata. The FTS index row is maintained in the same call; the
    /// embedding insert is best-effort (a provider failure is logged
    /// and the record stays unembedded).
    pub async fn store(
        &self,
        partition: Partition,
        body: &str,
        metadata: serde_json::Value,
    ) -> Result<String, Error> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now().timestamp();
        let metadata_json = serde_json::to_string(&metadata)?;

        sqlx::query(
            "INSERT INTO records (id, partition, body, metadata_json, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(partition.as_str())
        .bind(body)
        .bind(&metadata_json)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        sqlx::query("INSERT INTO records_fts (record_id, partition, body) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(partition.as_str())
            .bind(body)
            .execute(&self.pool)
            .await?;

        if self.config.embedding.is_enabled() {
            match embedding::embed_texts(&self.config.embedding, &[body.to_string()]).await {
                Ok(mut vectors) => {
                    if let Some(vector) = vectors.pop() {
                        self.insert_vector(&id, partition, &vector).await?;
                    }
                }
                Err(e) => {
                    warn!(record_id = %id, partition = %partition, "embedding skipped: {e}");
                }
            }
        }

        info!(record_id = %id, partition = %partition, "stored record");
        Ok(id)
    }

    async fn insert_vector(
        &self,
        record_id: &str,
        partition: Partition,
        vector: &[f32],
    ) -> Result<(), Error> {
        let model = self.config.embedding.model.as_deref().unwrap_or("unknown");
        sqlx::query(
            "INSERT OR REPLACE INTO record_vectors (record_id, partition, model, dims, embedding) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(record_id)
        .bind(partition.as_str())
        .bind(model)
        .bind(vector.len() as i64)
        .bind(embedding::vec_to_blob(vector))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Exact lookup by id within one partition.
    pub async fn get(
        &self,
        partition: Partition,
        id: &str,
    ) -> Result<Option<StoredRecord>, Error> {
        let row = sqlx::query(
            "SELECT id, partition, body, metadata_json, created_at FROM records WHERE partition = ? AND id = ?",
        )
        .bind(partition.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    /// Exact-match filter over metadata fields. No match is an empty
    /// vec. Results are ordered by creation time (insertion order
    /// breaking same-second ties).
    pub async fn query(
        &self,
        partition: Partition,
        filter: &[(&str, serde_json::Value)],
    ) -> Result<Vec<StoredRecord>, Error> {
        let mut sql = String::from(
            "SELECT id, partition, body, metadata_json, created_at FROM records WHERE partition = ?",
        );
        for _ in filter {
            sql.push_str(" AND json_extract(metadata_json, ?) = ?");
        }
        sql.push_str(" ORDER BY created_at ASC, rowid ASC");

        let mut query = sqlx::query(&sql).bind(partition.as_str());
        for (key, value) in filter {
            query = query.bind(format!("$.{}", key));
            query = match value {
                serde_json::Value::String(s) => query.bind(s.clone()),
                serde_json::Value::Number(n) if n.is_i64() => query.bind(n.as_i64().unwrap_or(0)),
                serde_json::Value::Number(n) => query.bind(n.as_f64().unwrap_or(0.0)),
                serde_json::Value::Bool(b) => query.bind(*b),
                other => query.bind(other.to_string()),
            };
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }

    /// Ranked approximate retrieval over the partition's record bodies.
    /// Hybrid when an embedding provider is configured, keyword FTS
    /// otherwise — so this never fails for lack of a provider, and a
    /// blank query or empty partition yields an empty result.
    pub async fn search(
        &self,
        partition: Partition,
        query: &str,
        limit: i64,
    ) -> Result<Vec<SearchHit>, Error> {
        let mode = search::default_mode(&self.config);
        self.search_with_mode(partition, query, mode, limit).await
    }

    /// Retrieval with an explicit mode; requesting semantic/hybrid
    /// without a provider is a configuration error at this level.
    pub async fn search_with_mode(
        &self,
        partition: Partition,
        query: &str,
        mode: SearchMode,
        limit: i64,
    ) -> Result<Vec<SearchHit>, Error> {
        search::search_records(&self.pool, &self.config, partition, query, mode, limit).await
    }

    /// Partition-scoped delete; returns whether a record existed.
    /// Lineage rows in other partitions are untouched — callers
    /// wanting full lineage deletion delete from each partition
    /// explicitly.
    pub async fn delete(&self, partition: Partition, id: &str) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM records WHERE partition = ? AND id = ?")
            .bind(partition.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        sqlx::query("DELETE FROM records_fts WHERE record_id = ? AND partition = ?")
            .bind(id)
            .bind(partition.as_str())
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM record_vectors WHERE record_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let existed = result.rows_affected() > 0;
        if existed {
            debug!(record_id = %id, partition = %partition, "deleted record");
        }
        Ok(existed)
    }

    /// Reconstruct the full lineage for one original: the original,
    /// every draft keyed to it, every review keyed to the original or
    /// one of its drafts, and the final version if present. A missing
    /// original is `Ok(None)`; missing downstream records are empty
    /// lists, not errors.
    pub async fn history(&self, original_id: &str) -> Result<Option<ContentHistory>, Error> {
        let Some(original) = self.get(Partition::Original, original_id).await? else {
            return Ok(None);
        };

        let drafts = self
            .query(
                Partition::Draft,
                &[("original_id", serde_json::json!(original_id))],
            )
            .await?;

        // Reviews reference the content they evaluate, which may be the
        // original or any draft of it.
        let mut lineage_ids: Vec<&str> = vec![original_id];
        lineage_ids.extend(drafts.iter().map(|d| d.id.as_str()));

        let placeholders = vec!["?"; lineage_ids.len()].join(", ");
        let sql = format!(
            "SELECT id, partition, body, metadata_json, created_at FROM records \
             WHERE partition = ? AND json_extract(metadata_json, '$.content_id') IN ({}) \
             ORDER BY created_at ASC, rowid ASC",
            placeholders
        );
        let mut query = sqlx::query(&sql).bind(Partition::Review.as_str());
        for id in &lineage_ids {
            query = query.bind(*id);
        }
        let reviews = query
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let final_version = self
            .query(
                Partition::Final,
                &[("original_id", serde_json::json!(original_id))],
            )
            .await?
            .pop();

        Ok(Some(ContentHistory {
            original,
            drafts,
            reviews,
            final_version,
        }))
    }

    // ============ Typed entry points ============

    /// Store a scraped page as the root of a new lineage.
    pub async fn store_original(&self, page: &ScrapedPage) -> Result<String, Error> {
        let metadata = serde_json::json!({
            "url": page.url,
            "title": page.title,
            "snapshot_path": page.snapshot_path,
            "headings": page.metadata.headings,
            "links": page.metadata.links,
            "images": page.metadata.images,
        });
        self.store(Partition::Original, &page.text_content, metadata)
            .await
    }

    /// Store one AI-generated draft. `version` is the caller's slot in
    /// the per-original sequence — use [`next_draft_version`] to claim
    /// the next one.
    ///
    /// [`next_draft_version`]: ContentStore::next_draft_version
    pub async fn store_draft(
        &self,
        original_id: &str,
        body: &str,
        style: &str,
        tone: &str,
        version: i64,
    ) -> Result<String, Error> {
        let metadata = serde_json::json!({
            "original_id": original_id,
            "style": style,
            "tone": tone,
            "version": version,
        });
        self.store(Partition::Draft, body, metadata).await
    }

    /// Store a review of a draft or original. The searchable body is
    /// the summary; the full report rides along in metadata.
    pub async fn store_review(
        &self,
        content_id: &str,
        report: &ReviewReport,
    ) -> Result<String, Error> {
        let metadata = serde_json::json!({
            "content_id": content_id,
            "overall_score": report.overall_score,
            "grammar_score": report.grammar_score,
            "style_score": report.style_score,
            "engagement_score": report.engagement_score,
            "used_fallback": report.is_fallback(),
            "report": serde_json::to_value(report)?,
        });
        let body = if report.summary.is_empty() {
            "Review completed"
        } else {
            &report.summary
        };
        self.store(Partition::Review, body, metadata).await
    }

    /// Store the final published version for an original. Any prior
    /// final for the same original is superseded (deleted) in the same
    /// call, keeping at most one final per lineage.
    pub async fn store_final(
        &self,
        original_id: &str,
        body: &str,
        requirements: &PublicationRequirements,
    ) -> Result<String, Error> {
        let stale = self
            .query(
                Partition::Final,
                &[("original_id", serde_json::json!(original_id))],
            )
            .await?;
        for old in &stale {
            self.delete(Partition::Final, &old.id).await?;
            info!(original_id, superseded = %old.id, "replaced prior final version");
        }

        let metadata = serde_json::json!({
            "original_id": original_id,
            "requirements": serde_json::to_value(requirements)?,
            "status": "published",
        });
        self.store(Partition::Final, body, metadata).await
    }

    /// Next draft version number for an original: 1 + the highest
    /// stored version, starting at 1.
    pub async fn next_draft_version(&self, original_id: &str) -> Result<i64, Error> {
        let max: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(CAST(json_extract(metadata_json, '$.version') AS INTEGER)) \
             FROM records WHERE partition = ? AND json_extract(metadata_json, '$.original_id') = ?",
        )
        .bind(Partition::Draft.as_str())
        .bind(original_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(max.unwrap_or(0) + 1)
    }
}

/// Map a `records` row to a [`StoredRecord`]. Shared with the search
/// module.
pub fn record_from_row(row: &SqliteRow) -> Result<StoredRecord, Error> {
    let partition: String = row.get("partition");
    let metadata_json: String = row.get("metadata_json");
    Ok(StoredRecord {
        id: row.get("id"),
        partition: partition.parse()?,
        body: row.get("body"),
        metadata: serde_json::from_str(&metadata_json).unwrap_or(serde_json::json!({})),
        created_at: row.get("created_at"),
    })
}
