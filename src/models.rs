//! Core data models for the versioned content store.
//!
//! Every persisted row is a [`StoredRecord`]: an immutable (id, body,
//! metadata, timestamp) tuple living in one of four [`Partition`]s.
//! Drafts, reviews, and final versions carry a lineage key in their
//! metadata pointing back to an upstream record; [`ContentHistory`]
//! is the transitive join over those keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The four content partitions. A closed set — unknown names are
/// rejected at the boundary with [`Error::UnknownPartition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Original,
    Draft,
    Review,
    Final,
}

impl Partition {
    pub const ALL: [Partition; 4] = [
        Partition::Original,
        Partition::Draft,
        Partition::Review,
        Partition::Final,
    ];

    /// Stable storage label, also the name accepted on CLI/HTTP surfaces.
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Original => "original_content",
            Partition::Draft => "ai_generated",
            Partition::Review => "reviews",
            Partition::Final => "final_versions",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Partition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "original_content" => Ok(Partition::Original),
            "ai_generated" => Ok(Partition::Draft),
            "reviews" => Ok(Partition::Review),
            "final_versions" => Ok(Partition::Final),
            other => Err(Error::UnknownPartition(other.to_string())),
        }
    }
}

/// A persisted record. Immutable once created — edits and regenerations
/// append new records, they never mutate existing ones.
#[derive(Debug, Clone, Serialize)]
pub struct StoredRecord {
    pub id: String,
    #[serde(serialize_with = "serialize_partition")]
    pub partition: Partition,
    /// Primary text body (the searchable document).
    pub body: String,
    /// Flat JSON object of scalar / JSON-serializable fields.
    pub metadata: serde_json::Value,
    /// Unix seconds.
    pub created_at: i64,
}

fn serialize_partition<S: serde::Serializer>(p: &Partition, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(p.as_str())
}

impl StoredRecord {
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    pub fn metadata_i64(&self, key: &str) -> Option<i64> {
        self.metadata.get(key).and_then(|v| v.as_i64())
    }

    pub fn created_at_iso(&self) -> String {
        chrono::DateTime::from_timestamp(self.created_at, 0)
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .unwrap_or_else(|| self.created_at.to_string())
    }
}

/// A page as returned by the scraper collaborator, before storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub url: String,
    pub title: String,
    pub text_content: String,
    /// Path of the captured page snapshot on disk.
    pub snapshot_path: String,
    pub metadata: PageMetadata,
}

/// Structural extraction metadata recorded alongside an original.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMetadata {
    pub headings: Vec<String>,
    pub links: Vec<String>,
    pub images: Vec<String>,
}

/// AI review of a piece of content. Scores are in [1, 10].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewReport {
    pub overall_score: u8,
    pub grammar_score: u8,
    pub style_score: u8,
    pub engagement_score: u8,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub summary: String,
    /// Present when this report was substituted for provider output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<ReviewFallback>,
}

/// Why a review report is a substitute rather than parsed provider output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ReviewFallback {
    /// The provider answered, but not with parseable review JSON.
    MalformedResponse { raw: String },
    /// The provider call itself failed.
    ProviderUnavailable { error: String },
}

impl ReviewReport {
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Requirements recorded with a final version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicationRequirements {
    pub style: String,
    pub tone: String,
    pub publication_format: String,
}

impl PublicationRequirements {
    pub fn new(style: &str, tone: &str) -> Self {
        Self {
            style: style.to_string(),
            tone: tone.to_string(),
            publication_format: "standard".to_string(),
        }
    }
}

/// Full processing lineage for one original document. Lists are ordered
/// by creation time; all of them may be empty and `final_version` absent
/// — an original with no downstream work is a valid state.
#[derive(Debug, Clone, Serialize)]
pub struct ContentHistory {
    pub original: StoredRecord,
    pub drafts: Vec<StoredRecord>,
    pub reviews: Vec<StoredRecord>,
    pub final_version: Option<StoredRecord>,
}

/// A ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub record: StoredRecord,
    /// Relevance in [0, 1], higher is better.
    pub score: f64,
    pub snippet: String,
}
