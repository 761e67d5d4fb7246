// In-memory collaborators shared by the integration tests.
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use common::SourceConfig;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use newsrelay::approval::ApprovalSettings;
use newsrelay::filter::{ArticleCandidate, ArticleMarkup, NewArticle, PublicationDate};
use newsrelay::identity::ArticleId;
use newsrelay::messenger::Messenger;
use newsrelay::scraping::{RawElement, Scraper};
use newsrelay::summary::Summarizer;

pub const CHANNEL: &str = "#test-news";

pub fn settings() -> ApprovalSettings {
    ApprovalSettings {
        channel: CHANNEL.to_string(),
        summary_sentences: 4,
        delay: Duration::ZERO,
    }
}

pub fn markup() -> ArticleMarkup {
    ArticleMarkup::new("https://example.com", "a.JtKRv", "time").expect("markup")
}

pub fn since() -> PublicationDate {
    PublicationDate::new(2024, 4)
}

pub fn source(name: &str) -> SourceConfig {
    SourceConfig {
        name: name.to_string(),
        url: format!("https://example.com/{}", name),
        scroll_depth: Some(3),
    }
}

/// Listing markup for one article as it appears on the aggregator.
pub fn listing(source: &str, href: &str, title: &str, datetime: &str) -> RawElement {
    RawElement::new(
        source,
        format!(
            r#"<article><h4><a class="JtKRv" href="{}">{}</a></h4><div><time datetime="{}">2 days ago</time></div></article>"#,
            href, title, datetime
        ),
    )
}

pub fn new_article(link: &str, title: &str) -> NewArticle {
    NewArticle {
        id: ArticleId::from_link(link),
        candidate: ArticleCandidate {
            title: title.to_string(),
            link: link.to_string(),
            published: Some(PublicationDate::new(2024, 5)),
        },
    }
}

/// Serves canned elements per source name; unknown sources fail.
#[derive(Default)]
pub struct FakeScraper {
    pub pages: HashMap<String, Vec<RawElement>>,
}

impl FakeScraper {
    pub fn with(mut self, source: &str, elements: Vec<RawElement>) -> Self {
        self.pages.insert(source.to_string(), elements);
        self
    }
}

#[async_trait::async_trait]
impl Scraper for FakeScraper {
    async fn fetch(&self, source: &SourceConfig) -> Result<Vec<RawElement>> {
        self.pages
            .get(&source.name)
            .cloned()
            .ok_or_else(|| anyhow!("connection refused: {}", source.url))
    }
}

/// Returns a fixed summary, or fails when `summary` is None.
pub struct FakeSummarizer {
    pub summary: Option<String>,
    pub calls: Mutex<Vec<(String, usize)>>,
}

impl FakeSummarizer {
    pub fn ok(summary: &str) -> Self {
        Self { summary: Some(summary.to_string()), calls: Mutex::new(Vec::new()) }
    }

    pub fn failing() -> Self {
        Self { summary: None, calls: Mutex::new(Vec::new()) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, url: &str, sentences: usize) -> Result<String> {
        self.calls.lock().unwrap().push((url.to_string(), sentences));
        self.summary.clone().ok_or_else(|| anyhow!("article download failed"))
    }
}

/// Records every message; fails every post when `fail` is set.
#[derive(Default)]
pub struct RecordingMessenger {
    pub fail: bool,
    pub posts: Mutex<Vec<(String, String)>>,
}

impl RecordingMessenger {
    pub fn failing() -> Self {
        Self { fail: true, posts: Mutex::new(Vec::new()) }
    }

    pub fn posts(&self) -> Vec<(String, String)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Messenger for RecordingMessenger {
    async fn post(&self, channel: &str, text: &str) -> Result<()> {
        self.posts.lock().unwrap().push((channel.to_string(), text.to_string()));
        if self.fail {
            return Err(anyhow!("channel_not_found"));
        }
        Ok(())
    }
}
