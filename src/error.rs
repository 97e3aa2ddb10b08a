//! Typed errors for the workflow engine.
//!
//! The store contract needs callers to tell failure classes apart:
//! persistence failures propagate, scrape failures end a run with "no
//! result", provider failures degrade to pass-through content, and
//! missing records are `Ok(None)` rather than errors. CLI and HTTP
//! boundaries convert these into `anyhow` context / JSON envelopes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Persistence-layer failure. Never recovered locally — a store
    /// failure invalidates lineage guarantees downstream.
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    /// Navigation or extraction failure while scraping a page.
    #[error("scrape failed for {url}: {reason}")]
    Scrape { url: String, reason: String },

    /// A partition name that is not part of the closed set.
    #[error("unknown partition '{0}' (expected original_content, ai_generated, reviews, or final_versions)")]
    UnknownPartition(String),

    /// Embedding provider failure (network, auth, malformed response).
    #[error("embedding provider error: {0}")]
    Embedding(String),

    /// Chat-completion provider failure.
    #[error("ai provider error: {0}")]
    Provider(String),

    /// Record payload could not be encoded or decoded.
    #[error("invalid record payload: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The decision front end failed to deliver a human decision.
    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error("{0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
