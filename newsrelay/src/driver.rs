use anyhow::Result;
use common::{Config, SourceConfig};
use tracing::{error, info, warn};

use crate::approval::{Approval, ApprovalSettings, Outcome, RunContext};
use crate::filter::{filter_new_articles, ArticleMarkup, NewArticle, PublicationDate};
use crate::messenger::Messenger;
use crate::operator::Operator;
use crate::scraping::{RawElement, Scraper};
use crate::storage::StateStore;
use crate::summary::Summarizer;

/// Collaborators used by a pass.
pub struct PassDeps<'a> {
    pub scraper: &'a dyn Scraper,
    pub summarizer: &'a dyn Summarizer,
    pub messenger: &'a dyn Messenger,
    pub operator: &'a mut dyn Operator,
}

/// Everything a pass needs from the configuration.
#[derive(Debug, Clone)]
pub struct PassSettings {
    pub sources: Vec<SourceConfig>,
    pub markup: ArticleMarkup,
    pub since: PublicationDate,
    pub approval: ApprovalSettings,
}

impl PassSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            sources: config.sources.clone(),
            markup: ArticleMarkup::from_config(&config.markup)?,
            since: PublicationDate::from(&config.filter),
            approval: ApprovalSettings {
                channel: config.messenger.channel.clone(),
                summary_sentences: config.summary_sentences(),
                delay: config.decision_delay(),
            },
        })
    }
}

/// Counters for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub scraped: usize,
    pub new_articles: usize,
    pub posted: usize,
    pub skipped: usize,
    pub invalid: usize,
    pub already_handled: usize,
    pub delivery_failed: usize,
}

impl PassReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::AlreadyHandled => self.already_handled += 1,
            Outcome::Posted => self.posted += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::InvalidResponse => self.invalid += 1,
            Outcome::DeliveryFailed => self.delivery_failed += 1,
        }
    }
}

pub const NO_NEW_ARTICLES: &str = "No new articles available at the moment.";

/// One fetch-filter-approve-persist cycle.
///
/// State is reloaded from `store` into `ctx` at the start and saved at the
/// end whatever happened in between; the sent-set in `ctx` is kept as is.
/// A failing source contributes nothing. If the operator channel breaks the
/// decisions made so far are still saved before the error is returned.
pub async fn run_pass(
    deps: &mut PassDeps<'_>,
    ctx: &mut RunContext,
    store: &StateStore,
    settings: &PassSettings,
) -> Result<PassReport> {
    ctx.state = store.load().await;
    let mut report = PassReport::default();

    let mut raw: Vec<RawElement> = Vec::new();
    for source in &settings.sources {
        match deps.scraper.fetch(source).await {
            Ok(elements) => raw.extend(elements),
            Err(e) => error!(source = %source.name, "failed to fetch source: {:#}", e),
        }
    }
    report.scraped = raw.len();

    let fresh = filter_new_articles(&raw, &settings.markup, settings.since, &ctx.state, &ctx.sent_this_run);
    report.new_articles = fresh.len();
    info!("pass: {} scraped, {} new", report.scraped, report.new_articles);

    let reviewed = review_all(deps, ctx, settings, &fresh, &mut report).await;

    let saved = store.save(&ctx.state).await;
    if let Err(e) = reviewed {
        if let Err(save_err) = &saved {
            warn!("state could not be saved either: {:#}", save_err);
        }
        return Err(e);
    }
    saved?;

    info!(?report, "pass complete");
    Ok(report)
}

async fn review_all(
    deps: &mut PassDeps<'_>,
    ctx: &mut RunContext,
    settings: &PassSettings,
    fresh: &[NewArticle],
    report: &mut PassReport,
) -> Result<()> {
    let mut approval = Approval {
        summarizer: deps.summarizer,
        messenger: deps.messenger,
        operator: &mut *deps.operator,
        settings: &settings.approval,
    };

    for article in fresh {
        let outcome = approval.review(ctx, article).await?;
        report.record(outcome);
    }

    if fresh.is_empty() {
        approval.operator.tell(NO_NEW_ARTICLES).await?;
    }
    Ok(())
}
