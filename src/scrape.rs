//! Page scraping collaborator.
//!
//! The workflow consumes scraping through the narrow [`Scraper`] trait;
//! [`HttpScraper`] is the built-in implementation: fetch with reqwest,
//! extract title/text/structure with CSS selectors, and keep a raw HTML
//! snapshot of the page on disk so the stored lineage records exactly
//! what extraction saw.

use std::path::PathBuf;

use async_trait::async_trait;
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::config::ScrapeConfig;
use crate::error::Error;
use crate::models::{PageMetadata, ScrapedPage};

#[async_trait]
pub trait Scraper: Send + Sync {
    /// Fetch and extract one page. Navigation and extraction failures
    /// are [`Error::Scrape`].
    async fn scrape(&self, url: &str) -> Result<ScrapedPage, Error>;
}

pub struct HttpScraper {
    client: reqwest::Client,
    output_dir: PathBuf,
}

impl HttpScraper {
    pub fn new(config: &ScrapeConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config(format!("cannot build http client: {}", e)))?;

        Ok(Self {
            client,
            output_dir: config.output_dir.clone(),
        })
    }

    fn write_snapshot(&self, url: &str, html: &str) -> Result<PathBuf, Error> {
        let dir = self.output_dir.join("snapshots");
        std::fs::create_dir_all(&dir).map_err(|e| Error::Scrape {
            url: url.to_string(),
            reason: format!("cannot create snapshot dir: {}", e),
        })?;

        let path = dir.join(snapshot_filename(url));
        std::fs::write(&path, html).map_err(|e| Error::Scrape {
            url: url.to_string(),
            reason: format!("cannot write snapshot: {}", e),
        })?;
        Ok(path)
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    async fn scrape(&self, url: &str) -> Result<ScrapedPage, Error> {
        url::Url::parse(url).map_err(|e| Error::Scrape {
            url: url.to_string(),
            reason: format!("invalid url: {}", e),
        })?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Scrape {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Scrape {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let html = response.text().await.map_err(|e| Error::Scrape {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let extracted = extract_page(&html);
        if extracted.text_content.trim().is_empty() {
            return Err(Error::Scrape {
                url: url.to_string(),
                reason: "no text content extracted".to_string(),
            });
        }

        let snapshot = self.write_snapshot(url, &html)?;
        info!(
            url,
            chars = extracted.text_content.len(),
            snapshot = %snapshot.display(),
            "scraped page"
        );

        Ok(ScrapedPage {
            url: url.to_string(),
            title: extracted.title,
            text_content: extracted.text_content,
            snapshot_path: snapshot.display().to_string(),
            metadata: extracted.metadata,
        })
    }
}

struct ExtractedPage {
    title: String,
    text_content: String,
    metadata: PageMetadata,
}

/// Pull title, main text, and structural metadata out of an HTML
/// document. Kept synchronous: `scraper::Html` is not `Send` and must
/// never be held across an await point.
fn extract_page(html: &str) -> ExtractedPage {
    let doc = Html::parse_document(html);

    let title_sel = Selector::parse("title").unwrap();
    let title = doc
        .select(&title_sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    // Content area heuristics, most specific first. `.mw-parser-output`
    // covers MediaWiki/Wikisource pages.
    let text_content = ["main", ".mw-parser-output", "#content", "article", "body"]
        .iter()
        .find_map(|sel_str| {
            let sel = Selector::parse(sel_str).unwrap();
            doc.select(&sel).next().map(|el| element_text(&el))
        })
        .unwrap_or_default();

    let heading_sel = Selector::parse("h1, h2, h3, h4, h5, h6").unwrap();
    let headings: Vec<String> = doc
        .select(&heading_sel)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    let link_sel = Selector::parse("a[href]").unwrap();
    let links: Vec<String> = doc
        .select(&link_sel)
        .filter_map(|el| el.value().attr("href"))
        .map(|href| href.to_string())
        .collect();

    let img_sel = Selector::parse("img[src]").unwrap();
    let images: Vec<String> = doc
        .select(&img_sel)
        .filter_map(|el| el.value().attr("src"))
        .map(|src| src.to_string())
        .collect();

    ExtractedPage {
        title,
        text_content,
        metadata: PageMetadata {
            headings,
            links,
            images,
        },
    }
}

/// Visible text of an element, one trimmed text node per line.
fn element_text(el: &scraper::ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Snapshot filename: sanitized url slug plus a short content-stable
/// hash so distinct urls never collide.
fn snapshot_filename(url: &str) -> String {
    let slug: String = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    let digest = Sha256::digest(url.as_bytes());
    let short = digest
        .iter()
        .take(4)
        .map(|b| format!("{:02x}", b))
        .collect::<String>();

    let slug = if slug.len() > 80 {
        slug.chars().take(80).collect()
    } else {
        slug
    };

    format!("{}-{}.html", slug, short)
}
