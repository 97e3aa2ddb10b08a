//! The publication workflow orchestrator.
//!
//! One run sequences: scrape → store original → AI draft → human
//! review loop → final AI review → finalize → store final version.
//! Steps execute strictly sequentially; the only long-lived suspension
//! points are the network scrape and the human-decision waits inside
//! the loop.
//!
//! Failure policy: a storage error aborts the run (lineage guarantees
//! would be broken downstream), everything AI-related degrades to
//! pass-through content with a logged warning, and both a failed
//! initial scrape and a mid-loop cancellation end the run with "no
//! result" — distinguishable only in the logs, since neither is a
//! fault of the engine.

use serde::Serialize;
use tracing::{info, warn};

use crate::agents::ContentAgents;
use crate::config::Config;
use crate::error::Error;
use crate::models::PublicationRequirements;
use crate::review_loop::{DecisionSource, LoopEvent, LoopOutcome, ReviewLoop};
use crate::scrape::Scraper;
use crate::store::ContentStore;

/// Everything a workflow run needs, constructed once and passed by
/// reference — there is no process-global state.
pub struct WorkflowContext {
    pub config: Config,
    pub store: ContentStore,
    pub scraper: Box<dyn Scraper>,
    pub agents: Option<Box<dyn ContentAgents>>,
}

impl WorkflowContext {
    pub fn agents_available(&self) -> bool {
        self.agents.is_some()
    }
}

/// Ids produced by a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRecord {
    pub original_id: String,
    pub draft_id: Option<String>,
    pub final_id: String,
    pub final_content: String,
}

/// Run the complete workflow for one url. `Ok(None)` means the scrape
/// failed or the human cancelled; storage errors propagate.
pub async fn run_workflow(
    ctx: &WorkflowContext,
    url: &str,
    style: &str,
    tone: &str,
    max_iterations: u32,
    source: &mut dyn DecisionSource,
) -> Result<Option<WorkflowRecord>, Error> {
    // Step 1: scrape and store the original.
    let page = match ctx.scraper.scrape(url).await {
        Ok(page) => page,
        Err(Error::Scrape { url, reason }) => {
            warn!(url, reason, "scrape failed; workflow produced no result");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let original_id = ctx.store.store_original(&page).await?;
    info!(
        %original_id,
        title = %page.title,
        chars = page.text_content.len(),
        "stored original content"
    );

    // Step 2: first AI draft, or the original text when agents are
    // unavailable or the writer fails.
    let agents = ctx.agents.as_deref();
    let (working, draft_id) = match agents {
        Some(agents) => match agents.rewrite(&page.text_content, style, tone).await {
            Ok(text) => {
                let version = ctx.store.next_draft_version(&original_id).await?;
                let draft_id = ctx
                    .store
                    .store_draft(&original_id, &text, style, tone, version)
                    .await?;
                info!(%draft_id, "stored AI draft");
                (text, Some(draft_id))
            }
            Err(e) => {
                warn!("draft generation failed: {e}; continuing with the original text");
                (page.text_content.clone(), None)
            }
        },
        None => {
            info!("AI agents not configured; skipping draft generation");
            (page.text_content.clone(), None)
        }
    };

    // Step 3: human review and iteration.
    let review_loop = ReviewLoop::new(&ctx.store, agents, max_iterations, style, tone);
    let reviewed = match review_loop
        .run(source, &original_id, &page.text_content, working)
        .await?
    {
        LoopOutcome::Approved(content) => content,
        LoopOutcome::MaxIterationsReached(content) => {
            warn!("iteration budget exhausted; proceeding with the last draft");
            content
        }
        LoopOutcome::Cancelled => {
            info!(%original_id, "workflow cancelled during review");
            return Ok(None);
        }
    };

    // Step 4: final AI review and finalization pass.
    let requirements = PublicationRequirements::new(style, tone);
    let mut final_content = reviewed.clone();
    if let Some(agents) = agents {
        let report = agents.review(&reviewed, Some(&page.text_content)).await;
        let review_target = draft_id.as_deref().unwrap_or(&original_id);
        let review_id = ctx.store.store_review(review_target, &report).await?;
        info!(%review_id, overall = report.overall_score, "stored final review");
        source.notify(LoopEvent::Review(&report));

        match agents.finalize(&reviewed, &requirements).await {
            Ok(text) => final_content = text,
            Err(e) => {
                warn!("finalization failed: {e}; publishing the reviewed content");
            }
        }
    } else {
        info!("AI agents not configured; skipping final review and polish");
    }

    // Step 5: store the final version.
    let final_id = ctx
        .store
        .store_final(&original_id, &final_content, &requirements)
        .await?;
    info!(%final_id, "stored final version");

    Ok(Some(WorkflowRecord {
        original_id,
        draft_id,
        final_id,
        final_content,
    }))
}
