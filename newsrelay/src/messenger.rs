use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// Delivers an approved message to a chat channel.
#[async_trait::async_trait]
pub trait Messenger: Send + Sync {
    async fn post(&self, channel: &str, text: &str) -> Result<()>;
}

/// Slack Web API `chat.postMessage` client.
pub struct SlackMessenger {
    api_url: String,
    token: String,
    client: reqwest::Client,
}

impl SlackMessenger {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        })
    }
}

#[derive(Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ok: bool,
    error: Option<String>,
}

#[async_trait::async_trait]
impl Messenger for SlackMessenger {
    async fn post(&self, channel: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/chat.postMessage", self.api_url))
            .bearer_auth(&self.token)
            .json(&PostMessageRequest { channel, text })
            .send()
            .await
            .context("failed to send Slack request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Slack API error {}: {}", status, body));
        }

        // Slack reports most failures with 200 + "ok": false
        let body: PostMessageResponse = response
            .json()
            .await
            .context("failed to parse Slack response")?;
        if !body.ok {
            return Err(anyhow!(
                "Slack rejected message: {}",
                body.error.unwrap_or_else(|| "unknown error".to_string())
            ));
        }

        info!(%channel, "message posted to Slack");
        Ok(())
    }
}

/// Dry-run messenger: logs the message instead of sending it.
pub struct LogMessenger;

#[async_trait::async_trait]
impl Messenger for LogMessenger {
    async fn post(&self, channel: &str, text: &str) -> Result<()> {
        info!(%channel, "dry run, not posting:\n{}", text);
        Ok(())
    }
}
