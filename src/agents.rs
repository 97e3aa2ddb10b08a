//! AI writing, reviewing, and editing collaborators.
//!
//! The workflow consumes these through the [`ContentAgents`] trait:
//! rewrite a text in a style/tone, review it with scored feedback,
//! improve it against a review, and finalize it for publication.
//!
//! [`ChatAgents`] implements the trait over a chat-completions
//! endpoint (`openai` or `ollama`), with the same provider dispatch
//! and retry/backoff shape as the embedding module. Review output is
//! requested as JSON; when the provider answers with something else,
//! a structurally valid default-scored report is substituted and the
//! substitution is recorded on the report's `fallback` field.
//!
//! `rewrite`/`improve`/`finalize` return `Result` — callers fall back
//! to their input on error, which keeps provider failures visible at
//! the call site without ever aborting a run.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::config::AiConfig;
use crate::error::Error;
use crate::models::{PublicationRequirements, ReviewFallback, ReviewReport};

#[async_trait]
pub trait ContentAgents: Send + Sync {
    /// Rewrite `text` in the given style and tone.
    async fn rewrite(&self, text: &str, style: &str, tone: &str) -> Result<String, Error>;

    /// Review `text`, optionally against the original it was derived
    /// from. Infallible: provider trouble produces a fallback report,
    /// never an error.
    async fn review(&self, text: &str, original: Option<&str>) -> ReviewReport;

    /// Produce an improved version of `text` addressing the review.
    async fn improve(&self, text: &str, report: &ReviewReport) -> Result<String, Error>;

    /// Final editing pass before publication.
    async fn finalize(
        &self,
        text: &str,
        requirements: &PublicationRequirements,
    ) -> Result<String, Error>;
}

pub struct ChatAgents {
    config: AiConfig,
    client: reqwest::Client,
}

impl ChatAgents {
    /// Build agents from config. Returns `None` when the provider is
    /// disabled or its prerequisites are missing — the workflow then
    /// degrades to pass-through content instead of failing.
    pub fn from_config(config: &AiConfig) -> Option<Self> {
        if !config.is_enabled() {
            return None;
        }
        if config.provider == "openai" && std::env::var("OPENAI_API_KEY").is_err() {
            warn!("ai.provider is 'openai' but OPENAI_API_KEY is not set; continuing without AI agents");
            return None;
        }

        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                warn!("cannot build http client for AI agents: {e}");
                return None;
            }
        };

        Some(Self {
            config: config.clone(),
            client,
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String, Error> {
        match self.config.provider.as_str() {
            "openai" => self.complete_openai(prompt).await,
            "ollama" => self.complete_ollama(prompt).await,
            other => Err(Error::Provider(format!("unknown ai provider: {}", other))),
        }
    }

    async fn complete_openai(&self, prompt: &str) -> Result<String, Error> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::Provider("OPENAI_API_KEY not set".to_string()))?;
        let model = self
            .config
            .model
            .as_ref()
            .ok_or_else(|| Error::Provider("ai.model required".to_string()))?;
        let base = self
            .config
            .url
            .as_deref()
            .unwrap_or("https://api.openai.com")
            .trim_end_matches('/');

        let body = serde_json::json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(format!("{}/v1/chat/completions", base))
                .header("Authorization", format!("Bearer {}", api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| Error::Provider(e.to_string()))?;
                        return json
                            .pointer("/choices/0/message/content")
                            .and_then(|c| c.as_str())
                            .map(|s| s.to_string())
                            .ok_or_else(|| {
                                Error::Provider("invalid response: missing message content".to_string())
                            });
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(Error::Provider(format!(
                            "OpenAI API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }
                    return Err(Error::Provider(format!(
                        "OpenAI API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(Error::Provider(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::Provider("completion failed after retries".to_string())))
    }

    async fn complete_ollama(&self, prompt: &str) -> Result<String, Error> {
        let model = self
            .config
            .model
            .as_ref()
            .ok_or_else(|| Error::Provider("ai.model required".to_string()))?;
        let url = self
            .config
            .url
            .as_deref()
            .unwrap_or("http://localhost:11434");

        let body = serde_json::json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
        });

        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(format!("{}/api/chat", url))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| Error::Provider(e.to_string()))?;
                        return json
                            .pointer("/message/content")
                            .and_then(|c| c.as_str())
                            .map(|s| s.to_string())
                            .ok_or_else(|| {
                                Error::Provider("invalid response: missing message content".to_string())
                            });
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(Error::Provider(format!(
                            "Ollama API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }
                    return Err(Error::Provider(format!(
                        "Ollama API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(Error::Provider(format!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        url, e
                    )));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::Provider("completion failed after retries".to_string())))
    }
}

#[async_trait]
impl ContentAgents for ChatAgents {
    async fn rewrite(&self, text: &str, style: &str, tone: &str) -> Result<String, Error> {
        let prompt = format!(
            "You are a writer rewriting a chapter from a book. Rewrite the following \
             content in a {style} style with a {tone} tone.\n\n\
             Original content:\n{text}\n\n\
             Instructions:\n\
             1. Maintain the core story and plot points\n\
             2. Improve readability and flow\n\
             3. Add engaging descriptions where appropriate\n\
             4. Keep the same chapter structure\n\n\
             Provide only the rewritten chapter."
        );
        self.complete(&prompt).await
    }

    async fn review(&self, text: &str, original: Option<&str>) -> ReviewReport {
        let comparison = match original {
            Some(orig) => format!("\n\nOriginal content for comparison:\n{orig}"),
            None => String::new(),
        };
        let prompt = format!(
            "You are a reviewer assessing a rewritten chapter. Review the following \
             content and answer with ONLY a JSON object in this shape:\n\
             {{\n\
               \"overall_score\": 1-10,\n\
               \"grammar_score\": 1-10,\n\
               \"style_score\": 1-10,\n\
               \"engagement_score\": 1-10,\n\
               \"strengths\": [\"...\"],\n\
               \"weaknesses\": [\"...\"],\n\
               \"suggestions\": [\"...\"],\n\
               \"summary\": \"brief summary of the review\"\n\
             }}\n\n\
             Content to review:\n{text}{comparison}"
        );

        match self.complete(&prompt).await {
            Ok(raw) => parse_review(&raw).unwrap_or_else(|| {
                warn!("review response was not parseable JSON; substituting default-scored report");
                malformed_review(&raw)
            }),
            Err(e) => {
                warn!("review call failed: {e}; substituting low-confidence report");
                unavailable_review(&e)
            }
        }
    }

    async fn improve(&self, text: &str, report: &ReviewReport) -> Result<String, Error> {
        let feedback = serde_json::to_string_pretty(report)?;
        let prompt = format!(
            "You are an editor. Improve the content below so it addresses the \
             weaknesses and incorporates the suggestions from the review feedback.\n\n\
             Content:\n{text}\n\n\
             Review feedback:\n{feedback}\n\n\
             Provide only the improved content."
        );
        self.complete(&prompt).await
    }

    async fn finalize(
        &self,
        text: &str,
        requirements: &PublicationRequirements,
    ) -> Result<String, Error> {
        let reqs = serde_json::to_string_pretty(requirements)?;
        let prompt = format!(
            "You are an editor performing the final pass before publication. \
             Finalize the content below: grammatically correct, well formatted, \
             consistent in style and tone.\n\n\
             Content:\n{text}\n\n\
             Publication requirements:\n{reqs}\n\n\
             Provide only the finalized content."
        );
        self.complete(&prompt).await
    }
}

// ============ Review response parsing ============

#[derive(Deserialize)]
struct RawReview {
    #[serde(default = "default_raw_score")]
    overall_score: f64,
    #[serde(default = "default_raw_score")]
    grammar_score: f64,
    #[serde(default = "default_raw_score")]
    style_score: f64,
    #[serde(default = "default_raw_score")]
    engagement_score: f64,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    weaknesses: Vec<String>,
    #[serde(default)]
    suggestions: Vec<String>,
    #[serde(default)]
    summary: String,
}

fn default_raw_score() -> f64 {
    7.0
}

/// Parse a review from raw model output. Tolerates prose or code
/// fences around the JSON object by slicing from the first `{` to the
/// last `}`.
fn parse_review(raw: &str) -> Option<ReviewReport> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }

    let parsed: RawReview = serde_json::from_str(&raw[start..=end]).ok()?;
    Some(ReviewReport {
        overall_score: clamp_score(parsed.overall_score),
        grammar_score: clamp_score(parsed.grammar_score),
        style_score: clamp_score(parsed.style_score),
        engagement_score: clamp_score(parsed.engagement_score),
        strengths: parsed.strengths,
        weaknesses: parsed.weaknesses,
        suggestions: parsed.suggestions,
        summary: parsed.summary,
        fallback: None,
    })
}

fn clamp_score(score: f64) -> u8 {
    score.round().clamp(1.0, 10.0) as u8
}

/// Default-scored report used when the provider answered with
/// something other than review JSON.
fn malformed_review(raw: &str) -> ReviewReport {
    ReviewReport {
        overall_score: 7,
        grammar_score: 7,
        style_score: 7,
        engagement_score: 7,
        strengths: vec!["Content is readable".to_string()],
        weaknesses: vec!["Automated review output could not be parsed".to_string()],
        suggestions: vec!["Review the content manually".to_string()],
        summary: "Review completed but the response format was unexpected".to_string(),
        fallback: Some(ReviewFallback::MalformedResponse {
            raw: raw.to_string(),
        }),
    }
}

/// Low-confidence report used when the provider call itself failed.
fn unavailable_review(error: &Error) -> ReviewReport {
    ReviewReport {
        overall_score: 5,
        grammar_score: 5,
        style_score: 5,
        engagement_score: 5,
        strengths: vec![],
        weaknesses: vec!["Automated review failed".to_string()],
        suggestions: vec!["Manual review required".to_string()],
        summary: format!("Review failed: {error}"),
        fallback: Some(ReviewFallback::ProviderUnavailable {
            error: error.to_string(),
        }),
    }
}
