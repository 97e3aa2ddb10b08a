//! Store statistics overview.
//!
//! A quick summary of what each partition holds and how much of it is
//! embedded. Used by `press stats` to confirm that workflow runs and
//! embedding backfills are landing where expected.

use anyhow::Result;

use crate::config::Config;
use crate::embedding;
use crate::models::Partition;
use crate::store::ContentStore;

struct PartitionStats {
    partition: Partition,
    record_count: i64,
    embedded_count: i64,
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let store = ContentStore::connect(config).await?;
    let pool = store.pool();

    let mut rows: Vec<PartitionStats> = Vec::new();
    for partition in Partition::ALL {
        let record_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE partition = ?")
                .bind(partition.as_str())
                .fetch_one(pool)
                .await?;
        let embedded_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM record_vectors WHERE partition = ?")
                .bind(partition.as_str())
                .fetch_one(pool)
                .await?;
        rows.push(PartitionStats {
            partition,
            record_count,
            embedded_count,
        });
    }

    let total: i64 = rows.iter().map(|r| r.record_count).sum();
    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    let provider = embedding::create_provider(&config.embedding)?;
    let embedding_display = if config.embedding.is_enabled() {
        format!("{} ({} dims)", provider.model_name(), provider.dims())
    } else {
        "disabled".to_string()
    };

    println!("Pressroom — Store Stats");
    println!("=======================");
    println!();
    println!("  Database:  {}", config.db.path.display());
    println!("  Size:      {}", format_bytes(db_size));
    println!("  Records:   {}", total);
    println!("  Embedding: {}", embedding_display);
    println!();
    println!("  {:<20} {:>8} {:>10}", "PARTITION", "RECORDS", "EMBEDDED");
    println!("  {}", "-".repeat(40));
    for row in &rows {
        println!(
            "  {:<20} {:>8} {:>10}",
            row.partition.as_str(),
            row.record_count,
            row.embedded_count
        );
    }
    println!();

    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
