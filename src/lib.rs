//! # Pressroom
//!
//! A human-in-the-loop content rewriting and publication workflow with
//! full version lineage.
//!
//! Pressroom turns a scraped web page into a published artifact through
//! staged AI rewriting and human review, recording every transformation
//! (original → AI drafts → reviews → final version) in a versioned
//! SQLite store with keyword and semantic retrieval.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌───────────┐   ┌─────────────┐   ┌──────────┐
//! │ Scraper │──▶│ AI agents │──▶│ Review loop │──▶│  SQLite   │
//! │ (http)  │   │ rewrite/  │   │ human in    │   │ 4 parts  │
//! └─────────┘   │ review    │   │ the loop    │   │ FTS5+Vec │
//!               └───────────┘   └─────────────┘   └────┬─────┘
//!                                                      │
//!                                  ┌───────────────────┤
//!                                  ▼                   ▼
//!                             ┌──────────┐       ┌──────────┐
//!                             │   CLI    │       │   HTTP   │
//!                             │ (press)  │       │  (axum)  │
//!                             └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! press init                                  # create the store
//! press publish --url https://example.com/ch1 # scrape, review, publish
//! press search "storm at sea"                 # search published content
//! press history <original-id>                 # full lineage
//! press serve                                 # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Typed engine errors |
//! | [`models`] | Partitions, records, reviews, lineage |
//! | [`store`] | The versioned content store |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`search`] | Keyword, semantic, and hybrid retrieval |
//! | [`scrape`] | Page scraping collaborator |
//! | [`agents`] | AI writer/reviewer/editor collaborators |
//! | [`review_loop`] | Bounded human-in-the-loop state machine |
//! | [`workflow`] | Workflow orchestrator |
//! | [`ui`] | Terminal prompts and rendering |
//! | [`server`] | HTTP API server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod agents;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod migrate;
pub mod models;
pub mod review_loop;
pub mod scrape;
pub mod search;
pub mod server;
pub mod stats;
pub mod store;
pub mod ui;
pub mod workflow;
