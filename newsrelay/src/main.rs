/*
newsrelay - main.rs
Runs scrape/filter/approve passes against the configured sources, either once
or on a fixed interval until interrupted.
*/

use anyhow::{Context, Result};
use clap::Parser;
use common::Config;
use std::path::PathBuf;
use tokio::select;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use newsrelay::approval::RunContext;
use newsrelay::driver::{run_pass, PassDeps, PassSettings};
use newsrelay::messenger::{LogMessenger, Messenger, SlackMessenger};
use newsrelay::operator::ConsoleOperator;
use newsrelay::scraping::HttpScraper;
use newsrelay::storage::StateStore;
use newsrelay::summary::ExtractiveSummarizer;

#[derive(Parser, Debug)]
#[command(name = "newsrelay", about = "Relay operator-approved news summaries to Slack")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    /// Log approved messages instead of posting them
    #[arg(long)]
    dry_run: bool,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays a clean operator prompt
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    // Credentials may live in a local .env file
    dotenv::dotenv().ok();

    let config = load_config(args.config).await?;

    let settings = PassSettings::from_config(&config)?;
    let store = StateStore::new(&config.state.path);
    let scraper = HttpScraper::new(config.fetch_timeout_seconds(), config.markup.article_selector())?;
    let summarizer = ExtractiveSummarizer::new(config.summary_timeout_seconds());
    let messenger = create_messenger(&config, args.dry_run)?;
    let mut operator = ConsoleOperator::new();

    let mut deps = PassDeps {
        scraper: &scraper,
        summarizer: &summarizer,
        messenger: messenger.as_ref(),
        operator: &mut operator,
    };
    let mut ctx = RunContext::default();

    loop {
        let report = select! {
            res = run_pass(&mut deps, &mut ctx, &store, &settings) => res?,
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received during pass, exiting without saving");
                break;
            }
        };
        info!(
            "{} new article(s): {} posted, {} skipped, {} unanswered",
            report.new_articles,
            report.posted,
            report.skipped,
            report.invalid + report.delivery_failed
        );

        if args.once {
            break;
        }

        let interval = config.pass_interval();
        info!("next pass in {:?}", interval);
        select! {
            _ = tokio::time::sleep(interval) => {},
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received, exiting");
                break;
            }
        }
    }

    Ok(())
}

/// `config.default.toml` merged with `--config` (must exist) or `config.toml` (if present).
async fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = explicit {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    .context("failed to load configuration")?;
    info!(default = ?default_path, override = ?override_path, "configuration loaded");
    Ok(config)
}

/// Create the messenger selected by `messenger.adapter` (or the dry-run flag).
fn create_messenger(config: &Config, dry_run: bool) -> Result<Box<dyn Messenger>> {
    let cfg = &config.messenger;
    let adapter = if dry_run { "log" } else { cfg.adapter.as_deref().unwrap_or("slack") };

    match adapter {
        "slack" => {
            let token_env = cfg.token_env.as_deref().unwrap_or("SLACK_BOT_TOKEN");
            let token = std::env::var(token_env)
                .with_context(|| format!("Slack token env var '{}' not set", token_env))?;
            let api_url = cfg.api_url.as_deref().unwrap_or("https://slack.com/api");
            let messenger = SlackMessenger::new(api_url, token, cfg.timeout_seconds.unwrap_or(10))?;
            info!(channel = %cfg.channel, "posting to Slack");
            Ok(Box::new(messenger))
        }
        "log" => {
            info!(channel = %cfg.channel, "dry run: messages are logged, not posted");
            Ok(Box::new(LogMessenger))
        }
        _ => anyhow::bail!("Unknown messenger adapter: {}", adapter),
    }
}
