//! Ranked retrieval over one partition.
//!
//! Three modes at record granularity:
//! - **keyword** — FTS5 over record bodies, bm25 rank negated so
//!   higher is better;
//! - **semantic** — cosine similarity between the embedded query and
//!   stored record vectors;
//! - **hybrid** — both channels min-max normalized to [0, 1] and
//!   merged with `retrieval.hybrid_alpha`.
//!
//! Blank queries and empty partitions return an empty result set, never
//! an error. FTS5 operator characters in the query are treated as plain
//! text by the sanitizer, so arbitrary user input cannot produce a
//! syntax error.

use std::collections::HashMap;
use std::str::FromStr;

use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::embedding;
use crate::error::Error;
use crate::models::{Partition, SearchHit};
use crate::store::record_from_row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Keyword,
    Semantic,
    Hybrid,
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "keyword" => Ok(SearchMode::Keyword),
            "semantic" => Ok(SearchMode::Semantic),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(Error::Config(format!(
                "Unknown search mode: {}. Use keyword, semantic, or hybrid.",
                other
            ))),
        }
    }
}

pub async fn search_records(
    pool: &SqlitePool,
    config: &Config,
    partition: Partition,
    query: &str,
    mode: SearchMode,
    limit: i64,
) -> Result<Vec<SearchHit>, Error> {
    if query.trim().is_empty() || limit < 1 {
        return Ok(Vec::new());
    }

    if mode != SearchMode::Keyword && !config.embedding.is_enabled() {
        return Err(Error::Config(format!(
            "search mode '{}' requires an embedding provider; set [embedding] in config",
            match mode {
                SearchMode::Semantic => "semantic",
                _ => "hybrid",
            }
        )));
    }

    let candidate_k = config.retrieval.candidate_k;

    let keyword_candidates = if mode != SearchMode::Semantic {
        fetch_keyword_candidates(pool, partition, query, candidate_k).await?
    } else {
        Vec::new()
    };

    let vector_candidates = if mode != SearchMode::Keyword {
        fetch_vector_candidates(pool, config, partition, query, candidate_k).await?
    } else {
        Vec::new()
    };

    if keyword_candidates.is_empty() && vector_candidates.is_empty() {
        return Ok(Vec::new());
    }

    let norm_keyword = normalize_scores(&keyword_candidates);
    let norm_vector = normalize_scores(&vector_candidates);

    let kw_map: HashMap<&str, f64> = norm_keyword
        .iter()
        .map(|(c, s)| (c.record_id.as_str(), *s))
        .collect();
    let vec_map: HashMap<&str, f64> = norm_vector
        .iter()
        .map(|(c, s)| (c.record_id.as_str(), *s))
        .collect();

    let mut merged: HashMap<&str, &Candidate> = HashMap::new();
    for c in keyword_candidates.iter().chain(vector_candidates.iter()) {
        merged.entry(c.record_id.as_str()).or_insert(c);
    }

    let alpha = match mode {
        SearchMode::Keyword => 0.0,
        SearchMode::Semantic => 1.0,
        SearchMode::Hybrid => config.retrieval.hybrid_alpha,
    };

    let mut hits: Vec<SearchHit> = Vec::with_capacity(merged.len());
    for (&record_id, &cand) in merged.iter() {
        let k = kw_map.get(record_id).copied().unwrap_or(0.0);
        let v = vec_map.get(record_id).copied().unwrap_or(0.0);
        let score = (1.0 - alpha) * k + alpha * v;

        let row = sqlx::query(
            "SELECT id, partition, body, metadata_json, created_at FROM records WHERE partition = ? AND id = ?",
        )
        .bind(partition.as_str())
        .bind(record_id)
        .fetch_optional(pool)
        .await?;

        // FTS/vector rows without a backing record mean a concurrent
        // delete; skip them.
        let Some(row) = row else { continue };
        let record = record_from_row(&row)?;

        let snippet = match &cand.snippet {
            Some(s) => s.clone(),
            None => body_snippet(&record.body),
        };

        hits.push(SearchHit {
            record,
            score,
            snippet,
        });
    }

    // Deterministic order: score desc, newest first, id asc.
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.record.created_at.cmp(&a.record.created_at))
            .then(a.record.id.cmp(&b.record.id))
    });
    hits.truncate(limit as usize);

    Ok(hits)
}

#[derive(Debug, Clone)]
struct Candidate {
    record_id: String,
    raw_score: f64,
    snippet: Option<String>,
}

async fn fetch_keyword_candidates(
    pool: &SqlitePool,
    partition: Partition,
    query: &str,
    candidate_k: i64,
) -> Result<Vec<Candidate>, Error> {
    let Some(match_expr) = fts_match_expr(query) else {
        return Ok(Vec::new());
    };

    let rows = sqlx::query(
        r#"
        SELECT record_id, rank,
               snippet(records_fts, 2, '>>>', '<<<', '...', 48) AS snippet
        FROM records_fts
        WHERE records_fts MATCH ? AND partition = ?
        ORDER BY rank
        LIMIT ?
        "#,
    )
    .bind(&match_expr)
    .bind(partition.as_str())
    .bind(candidate_k)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let rank: f64 = row.get("rank");
            Candidate {
                record_id: row.get("record_id"),
                raw_score: -rank, // negate so higher = better
                snippet: Some(row.get("snippet")),
            }
        })
        .collect())
}

async fn fetch_vector_candidates(
    pool: &SqlitePool,
    config: &Config,
    partition: Partition,
    query: &str,
    candidate_k: i64,
) -> Result<Vec<Candidate>, Error> {
    let query_vec = embedding::embed_query(&config.embedding, query).await?;

    let rows = sqlx::query("SELECT record_id, embedding FROM record_vectors WHERE partition = ?")
        .bind(partition.as_str())
        .fetch_all(pool)
        .await?;

    let mut candidates: Vec<Candidate> = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let vec = embedding::blob_to_vec(&blob);
            Candidate {
                record_id: row.get("record_id"),
                raw_score: embedding::cosine_similarity(&query_vec, &vec) as f64,
                snippet: None,
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.raw_score
            .partial_cmp(&a.raw_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(candidate_k as usize);

    Ok(candidates)
}

/// Build an FTS5 MATCH expression from free-form user text: each token
/// is quoted (operators become plain text) and tokens are OR-ed so the
/// ranking behaves like similarity, not exact conjunction.
fn fts_match_expr(query: &str) -> Option<String> {
    let tokens: Vec<String> = query
        .split_whitespace()
        .map(|t| t.replace('"', ""))
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t))
        .collect();

    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" OR "))
    }
}

fn body_snippet(body: &str) -> String {
    let prefix: String = body.chars().take(240).collect();
    prefix.replace('\n', " ").trim().to_string()
}

/// Min-max normalize raw scores to [0, 1].
fn normalize_scores(candidates: &[Candidate]) -> Vec<(&Candidate, f64)> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let s_min = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::INFINITY, f64::min);
    let s_max = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::NEG_INFINITY, f64::max);

    candidates
        .iter()
        .map(|c| {
            let norm = if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (c.raw_score - s_min) / (s_max - s_min)
            };
            (c, norm)
        })
        .collect()
}

/// Resolve the default mode for callers that do not ask for one:
/// hybrid when embeddings are configured, keyword otherwise. This is
/// what keeps the store-level `search` operation infallible with
/// respect to provider configuration.
pub fn default_mode(config: &Config) -> SearchMode {
    if config.embedding.is_enabled() {
        SearchMode::Hybrid
    } else {
        SearchMode::Keyword
    }
}
