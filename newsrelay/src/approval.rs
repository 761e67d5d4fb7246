use anyhow::Result;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

use crate::filter::NewArticle;
use crate::identity::ArticleId;
use crate::messenger::Messenger;
use crate::operator::{Decision, Operator};
use crate::storage::{ArticleRecord, ArticleStatus, PersistedState};
use crate::summary::Summarizer;

/// Decision state owned by the driver and lent to each step of a pass.
#[derive(Debug, Default)]
pub struct RunContext {
    pub state: PersistedState,
    /// Articles posted since the process started
    pub sent_this_run: HashSet<ArticleId>,
}

impl RunContext {
    pub fn is_decided(&self, id: &ArticleId) -> bool {
        self.state.contains(id) || self.sent_this_run.contains(id)
    }
}

#[derive(Debug, Clone)]
pub struct ApprovalSettings {
    pub channel: String,
    pub summary_sentences: usize,
    /// Pause after every operator decision
    pub delay: Duration,
}

/// What happened to one article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    AlreadyHandled,
    Posted,
    Skipped,
    /// Answer was neither yes nor no; nothing recorded
    InvalidResponse,
    /// Operator said yes but delivery failed; nothing recorded
    DeliveryFailed,
}

/// Chat message for an article, also shown to the operator for approval.
pub fn compose_message(title: &str, summary: &str, link: &str) -> String {
    format!("*Article:* {}\n*Summary:* {}\n*Link:* {}", title, summary, link)
}

/// Per-article approval: summarize, ask, post or skip, record.
pub struct Approval<'a> {
    pub summarizer: &'a dyn Summarizer,
    pub messenger: &'a dyn Messenger,
    pub operator: &'a mut dyn Operator,
    pub settings: &'a ApprovalSettings,
}

impl<'a> Approval<'a> {
    /// Review one article. State and sent-set are re-checked first because a
    /// batch may carry the same article twice.
    ///
    /// Errors only come from the operator channel; collaborator failures are
    /// absorbed into the outcome.
    pub async fn review(&mut self, ctx: &mut RunContext, article: &NewArticle) -> Result<Outcome> {
        let title = &article.candidate.title;
        let link = &article.candidate.link;

        if ctx.is_decided(&article.id) {
            let note = match ctx.state.get(&article.id).map(|r| r.status) {
                Some(ArticleStatus::Skipped) => "was previously skipped",
                _ => "has already been posted",
            };
            self.operator
                .tell(&format!("Article '{}' {}. Skipping...", title, note))
                .await?;
            return Ok(Outcome::AlreadyHandled);
        }

        let summary = match self.summarizer.summarize(link, self.settings.summary_sentences).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(%link, "summary failed, continuing without one: {:#}", e);
                String::new()
            }
        };
        let message = compose_message(title, &summary, link);

        let response = self
            .operator
            .ask(&format!(
                "Do you want to send this article to Slack?\n{}\n(yes/no): ",
                message
            ))
            .await?;

        let outcome = match Decision::parse(&response) {
            Some(Decision::Post) => match self.messenger.post(&self.settings.channel, &message).await {
                Ok(()) => {
                    ctx.state.put(article.id.clone(), ArticleRecord::posted(title.as_str()));
                    ctx.sent_this_run.insert(article.id.clone());
                    info!(id = %article.id, "posted '{}'", title);
                    Outcome::Posted
                }
                Err(e) => {
                    warn!(id = %article.id, "delivery failed for '{}': {:#}", title, e);
                    self.operator
                        .tell(&format!(
                            "Failed to post article '{}' to Slack; it will be offered again.",
                            title
                        ))
                        .await?;
                    Outcome::DeliveryFailed
                }
            },
            Some(Decision::Skip) => {
                ctx.state.put(article.id.clone(), ArticleRecord::skipped(title.as_str()));
                info!(id = %article.id, "skipped '{}'", title);
                self.operator
                    .tell(&format!("Article '{}' will not be posted to Slack.", title))
                    .await?;
                Outcome::Skipped
            }
            None => {
                // not recorded: the article comes back on the next pass
                self.operator
                    .tell("Invalid response. Article will not be posted to Slack.")
                    .await?;
                Outcome::InvalidResponse
            }
        };

        tokio::time::sleep(self.settings.delay).await;
        Ok(outcome)
    }
}
