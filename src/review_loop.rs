//! The bounded human-in-the-loop review state machine.
//!
//! Each pass presents the current draft and waits — indefinitely, with
//! no timeout — for one human decision delivered through a
//! [`DecisionSource`]. The source is a blocking prompt abstraction so
//! terminal and other front ends can supply decisions without the loop
//! depending on any input mechanism.
//!
//! The iteration counter advances by exactly one per consumed pass.
//! Two cases do not consume the budget: a cancel that the human
//! declines to confirm, and an empty (no-op) edit. Exhausting the
//! budget is not a failure: the loop exits with the last draft as an
//! implicit approval.
//!
//! Regenerated drafts are persisted as they are produced, so lineage
//! survives a process death mid-loop. Storage errors propagate; AI
//! errors are surfaced to the front end and the loop continues with
//! the draft it already has.

use tracing::{info, warn};

use crate::agents::ContentAgents;
use crate::error::Error;
use crate::models::ReviewReport;
use crate::store::ContentStore;

/// One human decision about the current draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Edit,
    Regenerate,
    Review,
    Cancel,
}

/// Presentation events pushed to the front end.
pub enum LoopEvent<'a> {
    Draft {
        body: &'a str,
        iteration: u32,
        max_iterations: u32,
    },
    Review(&'a ReviewReport),
    Warning(&'a str),
    Info(&'a str),
}

/// Blocking bridge to whatever is supplying human decisions.
pub trait DecisionSource: Send {
    /// Wait for the next decision about the presented draft.
    fn decide(&mut self, iteration: u32, max_iterations: u32) -> Result<Decision, Error>;

    /// Ask a yes/no question.
    fn confirm(&mut self, prompt: &str) -> Result<bool, Error>;

    /// Collect a manual edit of the draft. An empty string means "no
    /// changes".
    fn edit_body(&mut self, current: &str) -> Result<String, Error>;

    /// Presentation hook; implementations render or ignore events.
    fn notify(&mut self, event: LoopEvent<'_>);
}

/// Terminal states of the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The human approved this content.
    Approved(String),
    /// The human cancelled the workflow; no content survives.
    Cancelled,
    /// The iteration budget ran out; the last draft stands as an
    /// implicit approval.
    MaxIterationsReached(String),
}

pub struct ReviewLoop<'a> {
    store: &'a ContentStore,
    agents: Option<&'a dyn ContentAgents>,
    max_iterations: u32,
    style: &'a str,
    tone: &'a str,
}

impl<'a> ReviewLoop<'a> {
    pub fn new(
        store: &'a ContentStore,
        agents: Option<&'a dyn ContentAgents>,
        max_iterations: u32,
        style: &'a str,
        tone: &'a str,
    ) -> Self {
        Self {
            store,
            agents,
            max_iterations,
            style,
            tone,
        }
    }

    /// Drive the loop to a terminal state. `original_content` grounds
    /// regeneration and review; `first_draft` seeds the presentation.
    pub async fn run(
        &self,
        source: &mut dyn DecisionSource,
        original_id: &str,
        original_content: &str,
        first_draft: String,
    ) -> Result<LoopOutcome, Error> {
        let mut current = first_draft;
        let mut iteration: u32 = 1;

        while iteration <= self.max_iterations {
            source.notify(LoopEvent::Draft {
                body: &current,
                iteration,
                max_iterations: self.max_iterations,
            });

            match source.decide(iteration, self.max_iterations)? {
                Decision::Approve => {
                    info!(iteration, "draft approved");
                    return Ok(LoopOutcome::Approved(current));
                }

                Decision::Cancel => {
                    if source.confirm("Cancel the workflow and discard the current draft?")? {
                        info!(iteration, "workflow cancelled");
                        return Ok(LoopOutcome::Cancelled);
                    }
                    // Declined — re-prompt without consuming the budget.
                    continue;
                }

                Decision::Edit => {
                    let edited = source.edit_body(&current)?;
                    if edited.trim().is_empty() {
                        source.notify(LoopEvent::Info("no changes made"));
                        continue;
                    }
                    current = edited;
                    source.notify(LoopEvent::Info("draft updated with manual edits"));
                }

                Decision::Regenerate => {
                    let Some(agents) = self.agents else {
                        source.notify(LoopEvent::Warning(
                            "AI agents are not configured; cannot regenerate",
                        ));
                        continue;
                    };
                    match agents.rewrite(original_content, self.style, self.tone).await {
                        Ok(text) => {
                            let version = self.store.next_draft_version(original_id).await?;
                            let draft_id = self
                                .store
                                .store_draft(original_id, &text, self.style, self.tone, version)
                                .await?;
                            info!(%draft_id, version, "stored regenerated draft");
                            current = text;
                            source.notify(LoopEvent::Info("draft regenerated"));
                        }
                        Err(e) => {
                            warn!("regeneration failed: {e}");
                            source.notify(LoopEvent::Warning(&format!(
                                "regeneration failed, keeping the current draft: {e}"
                            )));
                        }
                    }
                }

                Decision::Review => {
                    let Some(agents) = self.agents else {
                        source.notify(LoopEvent::Warning(
                            "AI agents are not configured; review unavailable",
                        ));
                        iteration += 1;
                        continue;
                    };
                    let report = agents.review(&current, Some(original_content)).await;
                    source.notify(LoopEvent::Review(&report));

                    if source.confirm("Apply the suggested improvements?")? {
                        match agents.improve(&current, &report).await {
                            Ok(text) => {
                                current = text;
                                source.notify(LoopEvent::Info("improvements applied"));
                            }
                            Err(e) => {
                                warn!("improvement pass failed: {e}");
                                source.notify(LoopEvent::Warning(&format!(
                                    "improvement pass failed, keeping the current draft: {e}"
                                )));
                            }
                        }
                    }
                }
            }

            iteration += 1;
        }

        info!(
            max_iterations = self.max_iterations,
            "iteration budget exhausted; using the current draft"
        );
        Ok(LoopOutcome::MaxIterationsReached(current))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::config::Config;
    use crate::models::{Partition, PublicationRequirements};

    struct Scripted {
        decisions: VecDeque<Decision>,
        confirms: VecDeque<bool>,
        edits: VecDeque<String>,
        decide_calls: u32,
        warnings: Vec<String>,
    }

    impl Scripted {
        fn new(decisions: &[Decision]) -> Self {
            Self {
                decisions: decisions.iter().copied().collect(),
                confirms: VecDeque::new(),
                edits: VecDeque::new(),
                decide_calls: 0,
                warnings: Vec::new(),
            }
        }

        fn with_confirms(mut self, confirms: &[bool]) -> Self {
            self.confirms = confirms.iter().copied().collect();
            self
        }

        fn with_edits(mut self, edits: &[&str]) -> Self {
            self.edits = edits.iter().map(|e| e.to_string()).collect();
            self
        }
    }

    impl DecisionSource for Scripted {
        fn decide(&mut self, _iteration: u32, _max: u32) -> Result<Decision, Error> {
            self.decide_calls += 1;
            Ok(self
                .decisions
                .pop_front()
                .expect("loop consulted more decisions than scripted"))
        }

        fn confirm(&mut self, _prompt: &str) -> Result<bool, Error> {
            Ok(self.confirms.pop_front().unwrap_or(false))
        }

        fn edit_body(&mut self, _current: &str) -> Result<String, Error> {
            Ok(self.edits.pop_front().unwrap_or_default())
        }

        fn notify(&mut self, event: LoopEvent<'_>) {
            if let LoopEvent::Warning(msg) = event {
                self.warnings.push(msg.to_string());
            }
        }
    }

    struct StubAgents {
        rewrite_ok: bool,
        rewrites: AtomicUsize,
    }

    impl StubAgents {
        fn working() -> Self {
            Self {
                rewrite_ok: true,
                rewrites: AtomicUsize::new(0),
            }
        }

        fn broken() -> Self {
            Self {
                rewrite_ok: false,
                rewrites: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ContentAgents for StubAgents {
        async fn rewrite(&self, _text: &str, _style: &str, _tone: &str) -> Result<String, Error> {
            if self.rewrite_ok {
                let n = self.rewrites.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(format!("regenerated draft {n}"))
            } else {
                Err(Error::Provider("writer offline".to_string()))
            }
        }

        async fn review(&self, _text: &str, _original: Option<&str>) -> ReviewReport {
            ReviewReport {
                overall_score: 8,
                grammar_score: 8,
                style_score: 8,
                engagement_score: 8,
                strengths: vec![],
                weaknesses: vec![],
                suggestions: vec!["vary sentence length".to_string()],
                summary: "decent".to_string(),
                fallback: None,
            }
        }

        async fn improve(&self, _text: &str, _report: &ReviewReport) -> Result<String, Error> {
            Ok("improved draft".to_string())
        }

        async fn finalize(
            &self,
            text: &str,
            _requirements: &PublicationRequirements,
        ) -> Result<String, Error> {
            Ok(text.to_string())
        }
    }

    async fn temp_store() -> (tempfile::TempDir, ContentStore, String) {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.db.path = tmp.path().join("loop.sqlite");
        let store = ContentStore::connect(&config).await.unwrap();
        let original_id = store
            .store(
                Partition::Original,
                "the original chapter",
                serde_json::json!({"url": "https://x/1", "title": "T"}),
            )
            .await
            .unwrap();
        (tmp, store, original_id)
    }

    #[tokio::test]
    async fn approve_terminates_with_current_draft() {
        let (_tmp, store, original_id) = temp_store().await;
        let review_loop = ReviewLoop::new(&store, None, 5, "modern", "engaging");
        let mut source = Scripted::new(&[Decision::Approve]);

        let outcome = review_loop
            .run(&mut source, &original_id, "orig", "draft one".to_string())
            .await
            .unwrap();

        assert_eq!(outcome, LoopOutcome::Approved("draft one".to_string()));
        assert_eq!(source.decide_calls, 1);
    }

    #[tokio::test]
    async fn budget_exhaustion_returns_last_draft_without_consulting_further() {
        let (_tmp, store, original_id) = temp_store().await;
        let agents = StubAgents::working();
        let review_loop = ReviewLoop::new(&store, Some(&agents), 2, "modern", "engaging");
        // Third decision would be approve, but only 2 iterations are
        // allowed — the loop must exit before consulting it.
        let mut source = Scripted::new(&[
            Decision::Regenerate,
            Decision::Regenerate,
            Decision::Approve,
        ]);

        let outcome = review_loop
            .run(&mut source, &original_id, "orig", "seed".to_string())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            LoopOutcome::MaxIterationsReached("regenerated draft 2".to_string())
        );
        assert_eq!(source.decide_calls, 2);
    }

    #[tokio::test]
    async fn regenerated_drafts_are_persisted_with_increasing_versions() {
        let (_tmp, store, original_id) = temp_store().await;
        let agents = StubAgents::working();
        let review_loop = ReviewLoop::new(&store, Some(&agents), 5, "modern", "engaging");
        let mut source = Scripted::new(&[
            Decision::Regenerate,
            Decision::Regenerate,
            Decision::Regenerate,
            Decision::Approve,
        ]);

        review_loop
            .run(&mut source, &original_id, "orig", "seed".to_string())
            .await
            .unwrap();

        let drafts = store
            .query(
                Partition::Draft,
                &[("original_id", serde_json::json!(original_id))],
            )
            .await
            .unwrap();
        assert_eq!(drafts.len(), 3);
        let versions: Vec<i64> = drafts
            .iter()
            .map(|d| d.metadata_i64("version").unwrap())
            .collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn empty_edit_does_not_consume_the_budget() {
        let (_tmp, store, original_id) = temp_store().await;
        let review_loop = ReviewLoop::new(&store, None, 1, "modern", "engaging");
        let mut source =
            Scripted::new(&[Decision::Edit, Decision::Approve]).with_edits(&["", "unused"]);

        let outcome = review_loop
            .run(&mut source, &original_id, "orig", "seed".to_string())
            .await
            .unwrap();

        // With a budget of 1, the no-op edit must leave room for the
        // approve on the same iteration.
        assert_eq!(outcome, LoopOutcome::Approved("seed".to_string()));
    }

    #[tokio::test]
    async fn non_empty_edit_replaces_draft_and_advances() {
        let (_tmp, store, original_id) = temp_store().await;
        let review_loop = ReviewLoop::new(&store, None, 1, "modern", "engaging");
        let mut source =
            Scripted::new(&[Decision::Edit, Decision::Approve]).with_edits(&["hand-edited text"]);

        let outcome = review_loop
            .run(&mut source, &original_id, "orig", "seed".to_string())
            .await
            .unwrap();

        // The edit consumed the only iteration, so the loop force-exits
        // with the edited draft; the approve is never consulted.
        assert_eq!(
            outcome,
            LoopOutcome::MaxIterationsReached("hand-edited text".to_string())
        );
        assert_eq!(source.decide_calls, 1);
    }

    #[tokio::test]
    async fn unconfirmed_cancel_is_an_idempotent_reprompt() {
        let (_tmp, store, original_id) = temp_store().await;
        let review_loop = ReviewLoop::new(&store, None, 1, "modern", "engaging");
        let mut source =
            Scripted::new(&[Decision::Cancel, Decision::Approve]).with_confirms(&[false]);

        let outcome = review_loop
            .run(&mut source, &original_id, "orig", "seed".to_string())
            .await
            .unwrap();

        assert_eq!(outcome, LoopOutcome::Approved("seed".to_string()));
        assert_eq!(source.decide_calls, 2);
    }

    #[tokio::test]
    async fn confirmed_cancel_terminates() {
        let (_tmp, store, original_id) = temp_store().await;
        let review_loop = ReviewLoop::new(&store, None, 5, "modern", "engaging");
        let mut source = Scripted::new(&[Decision::Cancel]).with_confirms(&[true]);

        let outcome = review_loop
            .run(&mut source, &original_id, "orig", "seed".to_string())
            .await
            .unwrap();

        assert_eq!(outcome, LoopOutcome::Cancelled);
    }

    #[tokio::test]
    async fn failed_regeneration_keeps_draft_and_warns() {
        let (_tmp, store, original_id) = temp_store().await;
        let agents = StubAgents::broken();
        let review_loop = ReviewLoop::new(&store, Some(&agents), 5, "modern", "engaging");
        let mut source = Scripted::new(&[Decision::Regenerate, Decision::Approve]);

        let outcome = review_loop
            .run(&mut source, &original_id, "orig", "seed".to_string())
            .await
            .unwrap();

        assert_eq!(outcome, LoopOutcome::Approved("seed".to_string()));
        assert!(!source.warnings.is_empty());

        // Nothing was persisted for the failed attempt.
        let drafts = store
            .query(
                Partition::Draft,
                &[("original_id", serde_json::json!(original_id))],
            )
            .await
            .unwrap();
        assert!(drafts.is_empty());
    }

    #[tokio::test]
    async fn accepted_review_improvements_replace_the_draft() {
        let (_tmp, store, original_id) = temp_store().await;
        let agents = StubAgents::working();
        let review_loop = ReviewLoop::new(&store, Some(&agents), 5, "modern", "engaging");
        let mut source =
            Scripted::new(&[Decision::Review, Decision::Approve]).with_confirms(&[true]);

        let outcome = review_loop
            .run(&mut source, &original_id, "orig", "seed".to_string())
            .await
            .unwrap();

        assert_eq!(outcome, LoopOutcome::Approved("improved draft".to_string()));
    }

    #[tokio::test]
    async fn declined_review_improvements_keep_the_draft() {
        let (_tmp, store, original_id) = temp_store().await;
        let agents = StubAgents::working();
        let review_loop = ReviewLoop::new(&store, Some(&agents), 5, "modern", "engaging");
        let mut source =
            Scripted::new(&[Decision::Review, Decision::Approve]).with_confirms(&[false]);

        let outcome = review_loop
            .run(&mut source, &original_id, "orig", "seed".to_string())
            .await
            .unwrap();

        assert_eq!(outcome, LoopOutcome::Approved("seed".to_string()));
    }
}
