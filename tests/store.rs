//! Store-level integration tests against a temporary SQLite database.

use pressroom::config::Config;
use pressroom::models::{Partition, PublicationRequirements, ReviewReport, ScrapedPage};
use pressroom::store::ContentStore;
use tempfile::TempDir;

async fn temp_store() -> (TempDir, ContentStore) {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.db.path = tmp.path().join("data").join("store.sqlite");
    let store = ContentStore::connect(&config).await.unwrap();
    (tmp, store)
}

fn sample_page(url: &str, title: &str, text: &str) -> ScrapedPage {
    ScrapedPage {
        url: url.to_string(),
        title: title.to_string(),
        text_content: text.to_string(),
        snapshot_path: "snapshots/test.html".to_string(),
        metadata: Default::default(),
    }
}

fn sample_review(summary: &str) -> ReviewReport {
    ReviewReport {
        overall_score: 8,
        grammar_score: 9,
        style_score: 8,
        engagement_score: 7,
        strengths: vec!["clear".to_string()],
        weaknesses: vec![],
        suggestions: vec![],
        summary: summary.to_string(),
        fallback: None,
    }
}

#[tokio::test]
async fn store_get_round_trip_is_byte_exact() {
    let (_tmp, store) = temp_store().await;

    let body = "Hello world\n\twith tabs, ünïcode, and trailing space ";
    let metadata = serde_json::json!({"url": "https://x/1", "title": "T"});
    let id = store
        .store(Partition::Original, body, metadata.clone())
        .await
        .unwrap();

    let record = store.get(Partition::Original, &id).await.unwrap().unwrap();
    assert_eq!(record.body, body);
    assert_eq!(record.metadata, metadata);
    assert_eq!(record.id, id);
    assert!(record.created_at > 0);
}

#[tokio::test]
async fn get_missing_record_is_none_not_error() {
    let (_tmp, store) = temp_store().await;
    let result = store
        .get(Partition::Original, "no-such-id")
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn ids_are_scoped_to_their_partition() {
    let (_tmp, store) = temp_store().await;
    let id = store
        .store(Partition::Original, "text", serde_json::json!({}))
        .await
        .unwrap();
    assert!(store.get(Partition::Draft, &id).await.unwrap().is_none());
    assert!(store.get(Partition::Original, &id).await.unwrap().is_some());
}

#[tokio::test]
async fn query_filters_on_metadata_and_returns_empty_for_no_match() {
    let (_tmp, store) = temp_store().await;

    let a = store
        .store_original(&sample_page("https://x/1", "One", "first text"))
        .await
        .unwrap();
    store
        .store_draft(&a, "draft of one", "modern", "engaging", 1)
        .await
        .unwrap();
    store
        .store_draft("some-other-original", "unrelated", "modern", "engaging", 1)
        .await
        .unwrap();

    let drafts = store
        .query(Partition::Draft, &[("original_id", serde_json::json!(a))])
        .await
        .unwrap();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].body, "draft of one");

    let none = store
        .query(
            Partition::Draft,
            &[("original_id", serde_json::json!("missing"))],
        )
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn query_matches_integer_metadata() {
    let (_tmp, store) = temp_store().await;
    let a = "orig-a";
    store.store_draft(a, "v1", "modern", "engaging", 1).await.unwrap();
    store.store_draft(a, "v2", "modern", "engaging", 2).await.unwrap();

    let v2 = store
        .query(
            Partition::Draft,
            &[
                ("original_id", serde_json::json!(a)),
                ("version", serde_json::json!(2)),
            ],
        )
        .await
        .unwrap();
    assert_eq!(v2.len(), 1);
    assert_eq!(v2[0].body, "v2");
}

#[tokio::test]
async fn lineage_scenario_original_one_draft() {
    let (_tmp, store) = temp_store().await;

    let a = store
        .store_original(&sample_page("https://x/1", "T", "Hello world"))
        .await
        .unwrap();
    let b = store
        .store_draft(&a, "rewritten hello", "modern", "engaging", 1)
        .await
        .unwrap();

    let history = store.history(&a).await.unwrap().unwrap();
    assert_eq!(history.original.id, a);
    assert_eq!(history.drafts.len(), 1);
    assert_eq!(history.drafts[0].id, b);
    assert!(history.reviews.is_empty());
    assert!(history.final_version.is_none());
}

#[tokio::test]
async fn history_missing_original_is_none() {
    let (_tmp, store) = temp_store().await;
    assert!(store.history("no-such-id").await.unwrap().is_none());
}

#[tokio::test]
async fn history_collects_reviews_of_original_and_drafts() {
    let (_tmp, store) = temp_store().await;

    let a = store
        .store_original(&sample_page("https://x/1", "T", "text"))
        .await
        .unwrap();
    let draft = store
        .store_draft(&a, "draft", "modern", "engaging", 1)
        .await
        .unwrap();

    store.store_review(&a, &sample_review("on original")).await.unwrap();
    store
        .store_review(&draft, &sample_review("on draft"))
        .await
        .unwrap();
    // A review of unrelated content must not leak in.
    store
        .store_review("unrelated-id", &sample_review("elsewhere"))
        .await
        .unwrap();

    let history = store.history(&a).await.unwrap().unwrap();
    assert_eq!(history.reviews.len(), 2);
    let summaries: Vec<&str> = history.reviews.iter().map(|r| r.body.as_str()).collect();
    assert!(summaries.contains(&"on original"));
    assert!(summaries.contains(&"on draft"));
}

#[tokio::test]
async fn draft_versions_are_strictly_increasing_from_one() {
    let (_tmp, store) = temp_store().await;
    let a = store
        .store_original(&sample_page("https://x/1", "T", "text"))
        .await
        .unwrap();

    for _ in 0..4 {
        let version = store.next_draft_version(&a).await.unwrap();
        store
            .store_draft(&a, &format!("draft v{version}"), "modern", "engaging", version)
            .await
            .unwrap();
    }

    let history = store.history(&a).await.unwrap().unwrap();
    assert_eq!(history.drafts.len(), 4);
    let versions: Vec<i64> = history
        .drafts
        .iter()
        .map(|d| d.metadata_i64("version").unwrap())
        .collect();
    assert_eq!(versions, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn delete_is_partition_scoped_and_reports_existence() {
    let (_tmp, store) = temp_store().await;

    let a = store
        .store_original(&sample_page("https://x/1", "T", "text"))
        .await
        .unwrap();
    let draft = store
        .store_draft(&a, "draft", "modern", "engaging", 1)
        .await
        .unwrap();

    assert!(store.delete(Partition::Draft, &draft).await.unwrap());
    // Second delete: nothing left to remove.
    assert!(!store.delete(Partition::Draft, &draft).await.unwrap());

    // The referenced original survives, and history stays consistent.
    let history = store.history(&a).await.unwrap().unwrap();
    assert_eq!(history.original.id, a);
    assert!(history.drafts.is_empty());
}

#[tokio::test]
async fn store_final_supersedes_prior_final() {
    let (_tmp, store) = temp_store().await;

    let a = store
        .store_original(&sample_page("https://x/1", "T", "text"))
        .await
        .unwrap();
    let requirements = PublicationRequirements::new("modern", "engaging");

    let first = store
        .store_final(&a, "first final", &requirements)
        .await
        .unwrap();
    let second = store
        .store_final(&a, "second final", &requirements)
        .await
        .unwrap();

    // Exactly one final row remains, and it is the later one.
    let finals = store
        .query(Partition::Final, &[("original_id", serde_json::json!(a))])
        .await
        .unwrap();
    assert_eq!(finals.len(), 1);
    assert_eq!(finals[0].id, second);
    assert!(store.get(Partition::Final, &first).await.unwrap().is_none());

    let history = store.history(&a).await.unwrap().unwrap();
    assert_eq!(history.final_version.unwrap().body, "second final");
}

#[tokio::test]
async fn final_metadata_records_publication_status() {
    let (_tmp, store) = temp_store().await;
    let a = store
        .store_original(&sample_page("https://x/1", "T", "text"))
        .await
        .unwrap();
    let final_id = store
        .store_final(&a, "done", &PublicationRequirements::new("modern", "engaging"))
        .await
        .unwrap();

    let record = store.get(Partition::Final, &final_id).await.unwrap().unwrap();
    assert_eq!(record.metadata_str("status"), Some("published"));
    assert_eq!(record.metadata_str("original_id"), Some(a.as_str()));
}

#[tokio::test]
async fn search_empty_query_returns_nothing_even_on_empty_partition() {
    let (_tmp, store) = temp_store().await;
    let hits = store.search(Partition::Final, "", 5).await.unwrap();
    assert!(hits.len() <= 5);
    assert!(hits.is_empty());
}

#[tokio::test]
async fn search_finds_stored_content_ranked() {
    let (_tmp, store) = temp_store().await;

    store
        .store(
            Partition::Final,
            "The storm broke over the reef at dawn",
            serde_json::json!({"title": "Storm"}),
        )
        .await
        .unwrap();
    store
        .store(
            Partition::Final,
            "A quiet morning in the village market",
            serde_json::json!({"title": "Market"}),
        )
        .await
        .unwrap();

    let hits = store.search(Partition::Final, "storm reef", 5).await.unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].record.metadata_str("title"), Some("Storm"));
    assert!(hits[0].score >= hits.last().unwrap().score);
}

#[tokio::test]
async fn search_with_operator_characters_does_not_error() {
    let (_tmp, store) = temp_store().await;
    store
        .store(Partition::Final, "plain text", serde_json::json!({}))
        .await
        .unwrap();

    for query in ["AND OR NOT", "body: x", "\"unbalanced", "a* (b)"] {
        let hits = store.search(Partition::Final, query, 5).await.unwrap();
        assert!(hits.len() <= 5);
    }
}

#[tokio::test]
async fn search_respects_limit() {
    let (_tmp, store) = temp_store().await;
    for i in 0..8 {
        store
            .store(
                Partition::Final,
                &format!("chapter {i} of the voyage"),
                serde_json::json!({}),
            )
            .await
            .unwrap();
    }
    let hits = store.search(Partition::Final, "voyage", 3).await.unwrap();
    assert_eq!(hits.len(), 3);
}

#[tokio::test]
async fn concurrent_stores_for_different_lineages_all_land() {
    let (_tmp, store) = temp_store().await;
    let store = std::sync::Arc::new(store);

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .store_draft(
                    &format!("orig-{i}"),
                    &format!("draft {i}"),
                    "modern",
                    "engaging",
                    1,
                )
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for i in 0..8 {
        let drafts = store
            .query(
                Partition::Draft,
                &[("original_id", serde_json::json!(format!("orig-{i}")))],
            )
            .await
            .unwrap();
        assert_eq!(drafts.len(), 1);
    }
}
