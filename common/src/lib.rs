/*!
common/src/lib.rs

Shared configuration types and helpers for newsrelay.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader that merges a default config file with an override file
- Small helpers shared by the binaries and tests
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Persisted state configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Path to the JSON state file (e.g. "article_data.json")
    pub path: String,
}

/// One listing page to scrape per pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Short label used in logs ("search", "topic", ...)
    pub name: String,
    pub url: String,
    /// How far a rendering scraper should scroll before collecting articles
    pub scroll_depth: Option<u32>,
}

impl SourceConfig {
    pub fn scroll_depth(&self) -> u32 {
        self.scroll_depth.unwrap_or(2)
    }
}

/// Where to find title, link and date inside a listing page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkupConfig {
    /// Base used to resolve relative article links
    pub base_url: String,
    pub article_selector: Option<String>,
    pub anchor_selector: Option<String>,
    pub time_selector: Option<String>,
}

impl MarkupConfig {
    pub fn article_selector(&self) -> &str {
        self.article_selector.as_deref().unwrap_or("article")
    }

    pub fn anchor_selector(&self) -> &str {
        self.anchor_selector.as_deref().unwrap_or("a.JtKRv")
    }

    pub fn time_selector(&self) -> &str {
        self.time_selector.as_deref().unwrap_or("time")
    }
}

/// Recency cutoff: articles published before (since_year, since_month) are ignored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub since_year: i32,
    pub since_month: u32,
}

/// Extractive summary settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    pub sentences: Option<usize>,
    pub fetch_timeout_seconds: Option<u64>,
}

/// Messenger config. `adapter` is "slack" or "log" (dry run).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessengerConfig {
    pub adapter: Option<String>,
    pub channel: String,
    pub token_env: Option<String>,
    pub api_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Politeness / pacing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolitenessConfig {
    /// Pause after each operator decision
    pub delay_seconds: Option<u64>,
    /// Sleep between two passes in standalone mode
    pub pass_interval_seconds: Option<u64>,
    pub fetch_timeout_seconds: Option<u64>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub state: StateConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    pub markup: MarkupConfig,
    pub filter: FilterConfig,
    pub summary: Option<SummaryConfig>,
    pub messenger: MessengerConfig,
    pub politeness: Option<PolitenessConfig>,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        if let Some(path) = default_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path).await
                    .with_context(|| format!("Failed to read default config: {}", path.display()))?;
                let val: toml::Value = toml::from_str(&data)
                    .context("Failed to parse default configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        if let Some(path) = override_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path).await
                    .with_context(|| format!("Failed to read override config: {}", path.display()))?;
                let val: toml::Value = toml::from_str(&data)
                    .context("Failed to parse override configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    pub fn summary_sentences(&self) -> usize {
        self.summary.as_ref().and_then(|s| s.sentences).unwrap_or(4)
    }

    pub fn summary_timeout_seconds(&self) -> u64 {
        self.summary.as_ref().and_then(|s| s.fetch_timeout_seconds).unwrap_or(10)
    }

    pub fn decision_delay(&self) -> Duration {
        Duration::from_secs(self.politeness.as_ref().and_then(|p| p.delay_seconds).unwrap_or(1))
    }

    pub fn pass_interval(&self) -> Duration {
        Duration::from_secs(
            self.politeness
                .as_ref()
                .and_then(|p| p.pass_interval_seconds)
                .unwrap_or(60 * 60),
        )
    }

    pub fn fetch_timeout_seconds(&self) -> u64 {
        self.politeness.as_ref().and_then(|p| p.fetch_timeout_seconds).unwrap_or(30)
    }
}

// Arrays (e.g. `[[sources]]`) are replaced wholesale, not concatenated.
fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}
