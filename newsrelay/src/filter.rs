use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Datelike};
use common::{FilterConfig, MarkupConfig};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::identity::ArticleId;
use crate::scraping::RawElement;
use crate::storage::PersistedState;

/// Year and month an article was published. Ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PublicationDate {
    pub year: i32,
    pub month: u32,
}

impl PublicationDate {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// Parse the leading `YYYY-MM` of a `datetime` attribute.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(Self::new(dt.year(), dt.month()));
        }
        if value.as_bytes().get(4) != Some(&b'-') {
            return None;
        }
        let year = value.get(0..4)?.parse().ok()?;
        let month = value.get(5..7)?.parse().ok()?;
        (1..=12).contains(&month).then(|| Self::new(year, month))
    }
}

impl From<&FilterConfig> for PublicationDate {
    fn from(cfg: &FilterConfig) -> Self {
        Self::new(cfg.since_year, cfg.since_month)
    }
}

impl fmt::Display for PublicationDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleCandidate {
    pub title: String,
    /// Absolute link, resolved against the site base URL
    pub link: String,
    pub published: Option<PublicationDate>,
}

/// A candidate that passed the filter, with its identity already computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArticle {
    pub id: ArticleId,
    pub candidate: ArticleCandidate,
}

/// Why a scraped element could not be read as an article.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no article anchor in element")]
    MissingAnchor,
    #[error("article anchor has no title text")]
    EmptyTitle,
    #[error("article anchor has no href")]
    MissingHref,
    #[error("article link '{href}' cannot be resolved: {source}")]
    BadLink {
        href: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unreadable publication date '{0}'")]
    BadDate(String),
}

/// Selectors and base URL used to read candidates out of listing markup.
#[derive(Debug, Clone)]
pub struct ArticleMarkup {
    base_url: Url,
    anchor: Selector,
    time: Selector,
}

impl ArticleMarkup {
    pub fn new(base_url: &str, anchor_selector: &str, time_selector: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("invalid markup base_url: {}", base_url))?;
        Ok(Self {
            base_url,
            anchor: parse_selector(anchor_selector)?,
            time: parse_selector(time_selector)?,
        })
    }

    pub fn from_config(cfg: &MarkupConfig) -> Result<Self> {
        Self::new(&cfg.base_url, cfg.anchor_selector(), cfg.time_selector())
    }

    /// Read title, link and publication date from one scraped element.
    ///
    /// A missing `time` element is not an error (the date is just absent);
    /// a `time` element without a readable `datetime` is.
    pub fn extract(&self, raw: &RawElement) -> Result<ArticleCandidate, ExtractError> {
        let fragment = Html::parse_fragment(&raw.html);

        let anchor = fragment
            .select(&self.anchor)
            .next()
            .ok_or(ExtractError::MissingAnchor)?;
        let title = anchor.text().collect::<Vec<_>>().join(" ");
        let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
        if title.is_empty() {
            return Err(ExtractError::EmptyTitle);
        }

        let href = anchor.value().attr("href").ok_or(ExtractError::MissingHref)?;
        let link = self
            .base_url
            .join(href)
            .map_err(|source| ExtractError::BadLink { href: href.to_string(), source })?;

        let published = match fragment.select(&self.time).next() {
            None => None,
            Some(time) => {
                let value = time.value().attr("datetime").unwrap_or_default();
                Some(
                    PublicationDate::parse(value)
                        .ok_or_else(|| ExtractError::BadDate(value.to_string()))?,
                )
            }
        };

        Ok(ArticleCandidate { title, link: link.to_string(), published })
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("invalid CSS selector '{}': {:?}", selector, e))
}

/// Reduce a scraped batch to the articles worth asking the operator about.
///
/// Drops elements that fail extraction, have no date, predate `since`, or
/// whose identity is already in `state` or `sent`. Order is preserved.
/// Duplicates inside the batch are kept; the approval step re-checks.
pub fn filter_new_articles(
    raw: &[RawElement],
    markup: &ArticleMarkup,
    since: PublicationDate,
    state: &PersistedState,
    sent: &HashSet<ArticleId>,
) -> Vec<NewArticle> {
    let mut fresh = Vec::new();

    for element in raw {
        let candidate = match markup.extract(element) {
            Ok(candidate) => candidate,
            Err(e) => {
                debug!(source = %element.source, "dropping element: {}", e);
                continue;
            }
        };

        let Some(published) = candidate.published else {
            debug!(title = %candidate.title, "dropping undated article");
            continue;
        };
        if published < since {
            debug!(title = %candidate.title, %published, "dropping article older than {}", since);
            continue;
        }

        let id = ArticleId::from_link(&candidate.link);
        if state.contains(&id) || sent.contains(&id) {
            debug!(title = %candidate.title, %id, "already decided");
            continue;
        }

        fresh.push(NewArticle { id, candidate });
    }

    info!("filter: {} of {} scraped elements are new", fresh.len(), raw.len());
    fresh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ArticleRecord;

    fn markup() -> ArticleMarkup {
        ArticleMarkup::new("https://news.google.com", "a.JtKRv", "time").expect("markup")
    }

    fn element(href: &str, title: &str, datetime: Option<&str>) -> RawElement {
        let time = datetime
            .map(|d| format!(r#"<div><time datetime="{}">3 days ago</time></div>"#, d))
            .unwrap_or_default();
        RawElement::new(
            "test",
            format!(
                r#"<article><a class="JtKRv" href="{}">{}</a>{}</article>"#,
                href, title, time
            ),
        )
    }

    fn since() -> PublicationDate {
        PublicationDate::new(2024, 4)
    }

    #[test]
    fn extracts_title_link_and_date() {
        let raw = element("./read/CBMiabc?hl=en-GB", "  Front line\n moves  ", Some("2024-05-02T08:00:00Z"));
        let candidate = markup().extract(&raw).expect("extract");
        assert_eq!(candidate.title, "Front line moves");
        assert_eq!(candidate.link, "https://news.google.com/read/CBMiabc?hl=en-GB");
        assert_eq!(candidate.published, Some(PublicationDate::new(2024, 5)));
    }

    #[test]
    fn aggregator_links_keep_the_identity_stored_by_earlier_deployments() {
        // earlier deployments built links as base url + href with every '.' removed
        let href = "./read/CBMiXmh0dHBzOi8vd3d3LmJiYy5jby51ay9uZXdzL2FydGljbGVzL2MxMjM0NTY3ODlv0gEA_-x?hl=en-GB&gl=GB&ceid=GB:en";
        let legacy = format!("https://news.google.com{}", href.replace('.', ""));

        let candidate = markup().extract(&element(href, "Title", None)).expect("extract");
        assert_eq!(
            ArticleId::from_link(&candidate.link),
            ArticleId::from_link(&legacy)
        );
    }

    #[test]
    fn extraction_failures_are_typed() {
        let m = markup();
        let no_anchor = RawElement::new("test", "<article><h3>Just a heading</h3></article>");
        assert!(matches!(m.extract(&no_anchor), Err(ExtractError::MissingAnchor)));

        let no_href = RawElement::new("test", r#"<article><a class="JtKRv">Title</a></article>"#);
        assert!(matches!(m.extract(&no_href), Err(ExtractError::MissingHref)));

        let no_text = element("./read/x", "   ", Some("2024-05-01T00:00:00Z"));
        assert!(matches!(m.extract(&no_text), Err(ExtractError::EmptyTitle)));

        let bad_date = element("./read/x", "Title", Some("yesterday"));
        assert!(matches!(m.extract(&bad_date), Err(ExtractError::BadDate(_))));
    }

    #[test]
    fn publication_date_parsing() {
        assert_eq!(PublicationDate::parse("2024-04-30T23:59:59Z"), Some(PublicationDate::new(2024, 4)));
        assert_eq!(PublicationDate::parse("2024-11"), Some(PublicationDate::new(2024, 11)));
        assert_eq!(PublicationDate::parse("2024-13-01"), None);
        assert_eq!(PublicationDate::parse("24-01-01"), None);
        assert_eq!(PublicationDate::parse(""), None);
        assert!(PublicationDate::new(2023, 12) < PublicationDate::new(2024, 4));
        assert!(PublicationDate::new(2025, 1) > PublicationDate::new(2024, 4));
    }

    #[test]
    fn drops_broken_undated_and_old_articles() {
        let raw = vec![
            RawElement::new("test", "<article>ad slot</article>"),
            element("./read/undated", "Undated", None),
            element("./read/old", "Old news", Some("2023-12-20T10:00:00Z")),
            element("./read/march", "March", Some("2024-03-31T10:00:00Z")),
            element("./read/april", "April", Some("2024-04-01T10:00:00Z")),
            element("./read/next-year", "Next year", Some("2025-01-05T10:00:00Z")),
        ];

        let fresh = filter_new_articles(&raw, &markup(), since(), &PersistedState::default(), &HashSet::new());
        let titles: Vec<_> = fresh.iter().map(|a| a.candidate.title.as_str()).collect();
        assert_eq!(titles, vec!["April", "Next year"]);
    }

    #[test]
    fn drops_known_and_sent_identities_but_keeps_in_batch_duplicates() {
        let raw = vec![
            element("./read/posted?hl=en", "Posted", Some("2024-05-01T00:00:00Z")),
            element("./read/sent", "Sent", Some("2024-05-01T00:00:00Z")),
            element("./read/fresh?x=1", "Fresh", Some("2024-05-01T00:00:00Z")),
            element("./read/fresh?x=2", "Fresh again", Some("2024-05-01T00:00:00Z")),
        ];
        let mut state = PersistedState::default();
        state.put(
            ArticleId::from_link("https://news.google.com/read/posted"),
            ArticleRecord::skipped("Posted"),
        );
        let sent: HashSet<_> = [ArticleId::from_link("https://news.google.com/read/sent")].into();

        let fresh = filter_new_articles(&raw, &markup(), since(), &state, &sent);
        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh[0].id, fresh[1].id);
        assert_eq!(fresh[0].candidate.title, "Fresh");
    }

    #[test]
    fn filtering_a_decided_batch_again_yields_nothing() {
        let raw = vec![
            element("./read/one", "One", Some("2024-06-01T00:00:00Z")),
            element("./read/two", "Two", Some("2024-07-01T00:00:00Z")),
        ];
        let m = markup();
        let mut state = PersistedState::default();
        for article in filter_new_articles(&raw, &m, since(), &state, &HashSet::new()) {
            state.put(article.id, ArticleRecord::posted(article.candidate.title));
        }

        assert!(filter_new_articles(&raw, &m, since(), &state, &HashSet::new()).is_empty());
    }

    #[test]
    fn rejects_invalid_markup_config() {
        assert!(ArticleMarkup::new("not a url", "a", "time").is_err());
        assert!(ArticleMarkup::new("https://news.google.com", "a[", "time").is_err());
    }
}
