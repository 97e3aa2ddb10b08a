use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub db: DbConfig,
    pub scrape: ScrapeConfig,
    pub ai: AiConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub review: ReviewConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DbConfig {
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/pressroom.sqlite"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Directory where page snapshots are written (under `snapshots/`).
    pub output_dir: PathBuf,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            timeout_secs: 30,
            user_agent: format!("pressroom/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Chat-completion provider used by the writer/reviewer/editor agents.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AiConfig {
    /// `disabled`, `openai`, or `ollama`.
    pub provider: String,
    pub model: Option<String>,
    /// Base URL override (required for `ollama`, optional for `openai`).
    pub url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            url: None,
            timeout_secs: 120,
            max_retries: 3,
        }
    }
}

impl AiConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `disabled`, `openai`, or `ollama`.
    pub provider: String,
    pub model: Option<String>,
    pub dims: Option<usize>,
    /// Base URL override (used by the `ollama` provider).
    pub url: Option<String>,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Weight of the semantic channel in hybrid scoring, in [0, 1].
    pub hybrid_alpha: f64,
    /// Candidates fetched per channel before merging.
    pub candidate_k: i64,
    pub final_limit: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            hybrid_alpha: 0.6,
            candidate_k: 80,
            final_limit: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReviewConfig {
    /// Iteration budget for the human review loop.
    pub max_iterations: u32,
    /// Characters of draft text shown per preview in the terminal.
    pub preview_chars: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            preview_chars: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7811".to_string(),
        }
    }
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load a config file if it exists, otherwise fall back to built-in
/// defaults (local SQLite, all providers disabled). Every default is
/// valid, so the binary works without any configuration.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    if !(0.0..=1.0).contains(&config.retrieval.hybrid_alpha) {
        anyhow::bail!("retrieval.hybrid_alpha must be in [0.0, 1.0]");
    }
    if config.retrieval.final_limit < 1 {
        anyhow::bail!("retrieval.final_limit must be >= 1");
    }
    if config.retrieval.candidate_k < 1 {
        anyhow::bail!("retrieval.candidate_k must be >= 1");
    }
    if config.review.max_iterations < 1 {
        anyhow::bail!("review.max_iterations must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.embedding.is_enabled() {
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.ai.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown ai provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.ai.is_enabled() && config.ai.model.is_none() {
        anyhow::bail!(
            "ai.model must be specified when provider is '{}'",
            config.ai.provider
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        validate(&Config::default()).unwrap();
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.review.max_iterations, 5);
        assert_eq!(config.ai.provider, "disabled");
        assert!(!config.embedding.is_enabled());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [review]
            max_iterations = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.review.max_iterations, 2);
        assert_eq!(config.review.preview_chars, 500);
        assert_eq!(config.retrieval.final_limit, 10);
    }

    #[test]
    fn embedding_without_dims_rejected() {
        let config: Config = toml::from_str(
            r#"
            [embedding]
            provider = "openai"
            model = "text-embedding-3-small"
            "#,
        )
        .unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn unknown_ai_provider_rejected() {
        let config: Config = toml::from_str(
            r#"
            [ai]
            provider = "gemini"
            model = "gemini-pro"
            "#,
        )
        .unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn alpha_out_of_range_rejected() {
        let config: Config = toml::from_str(
            r#"
            [retrieval]
            hybrid_alpha = 1.5
            "#,
        )
        .unwrap();
        assert!(validate(&config).is_err());
    }
}
