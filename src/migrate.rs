use sqlx::SqlitePool;

use crate::error::Error;

/// Create the schema. Idempotent — safe to run on every connect, which
/// gives the store get-or-create semantics for its partitions.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), Error> {
    // One append-only log of immutable records across all partitions.
    // The rowid keeps insertion order as a tiebreaker for same-second
    // timestamps.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            id TEXT NOT NULL,
            partition TEXT NOT NULL,
            body TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL,
            PRIMARY KEY (partition, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='records_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE records_fts USING fts5(
                record_id UNINDEXED,
                partition UNINDEXED,
                body
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS record_vectors (
            record_id TEXT PRIMARY KEY,
            partition TEXT NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_records_partition_created ON records(partition, created_at)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_record_vectors_partition ON record_vectors(partition)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
