use anyhow::{anyhow, Context, Result};
use common::SourceConfig;
use reqwest::Client;
use scraper::{Html, Selector};
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_AGENT: &str = "newsrelay/0.1.0";

/// Outer HTML of one article element on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawElement {
    /// Name of the source it was scraped from
    pub source: String,
    pub html: String,
}

impl RawElement {
    pub fn new(source: impl Into<String>, html: impl Into<String>) -> Self {
        Self { source: source.into(), html: html.into() }
    }
}

/// Collects the article elements of a listing page.
#[async_trait::async_trait]
pub trait Scraper: Send + Sync {
    async fn fetch(&self, source: &SourceConfig) -> Result<Vec<RawElement>>;
}

/// Plain HTTP scraper. It sees only server-rendered markup, so the source's
/// scroll depth is logged but has no effect.
pub struct HttpScraper {
    client: Client,
    article_selector: String,
}

impl HttpScraper {
    pub fn new(timeout_secs: u64, article_selector: impl Into<String>) -> Result<Self> {
        let article_selector = article_selector.into();
        Selector::parse(&article_selector)
            .map_err(|e| anyhow!("invalid article selector '{}': {:?}", article_selector, e))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self { client, article_selector })
    }
}

#[async_trait::async_trait]
impl Scraper for HttpScraper {
    async fn fetch(&self, source: &SourceConfig) -> Result<Vec<RawElement>> {
        debug!(source = %source.name, depth = source.scroll_depth(), "fetching listing page");

        let response = self
            .client
            .get(&source.url)
            .send()
            .await
            .with_context(|| format!("failed to fetch listing page {}", source.url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("listing fetch failed with status: {}", status));
        }

        let body = response.text().await.context("failed to read response body")?;
        let elements = article_elements(&body, &self.article_selector, &source.name)?;
        info!(source = %source.name, "scraping: {} article elements", elements.len());
        Ok(elements)
    }
}

fn article_elements(html: &str, selector: &str, source: &str) -> Result<Vec<RawElement>> {
    let selector = Selector::parse(selector)
        .map_err(|e| anyhow!("invalid article selector '{}': {:?}", selector, e))?;
    let document = Html::parse_document(html);

    Ok(document
        .select(&selector)
        .map(|element| RawElement::new(source, element.html()))
        .collect())
}

/// Fetch an article page and return its main text.
/// Returns an empty string if readability finds nothing to extract.
pub async fn scrape_article_content(url: &str, timeout_secs: u64) -> Result<String> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .context("failed to build reqwest client")?;

    let response = client.get(url).send().await.context("failed to fetch article page")?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("article fetch failed with status: {}", status));
    }

    // Readability requires a Reader, so we fetch bytes
    let bytes = response.bytes().await.context("failed to read response body")?;
    let mut reader = Cursor::new(bytes);
    let url_obj = url::Url::parse(url).context("failed to parse article URL")?;

    match readability::extractor::extract(&mut reader, &url_obj) {
        Ok(product) => match html2text::from_read(product.content.as_bytes(), 10_000) {
            Ok(text) => {
                info!("scraping: readability extracted {} chars from {}", text.len(), url);
                Ok(text)
            }
            Err(e) => {
                warn!("scraping: failed to convert extracted HTML to text: {}", e);
                Ok(product.text)
            }
        },
        Err(e) => {
            warn!("scraping: readability failed for {}: {}", url, e);
            Ok(String::new())
        }
    }
}
