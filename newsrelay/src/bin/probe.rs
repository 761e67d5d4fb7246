// Fetch every configured source and list what the next pass would ask about.
// Nothing is summarized, posted or saved.
use std::path::PathBuf;

use common::Config;
use newsrelay::filter::{filter_new_articles, ArticleMarkup, PublicationDate};
use newsrelay::scraping::{HttpScraper, Scraper};
use newsrelay::storage::StateStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let override_path = std::env::args().nth(1).map(PathBuf::from);
    let default_path = PathBuf::from("config.default.toml");
    let config = Config::load_with_defaults(Some(&default_path), override_path.as_deref()).await?;

    let scraper = HttpScraper::new(config.fetch_timeout_seconds(), config.markup.article_selector())?;
    let markup = ArticleMarkup::from_config(&config.markup)?;
    let state = StateStore::new(&config.state.path).load().await;
    println!("{} decided article(s) in {}", state.len(), config.state.path);

    let mut raw = Vec::new();
    for source in &config.sources {
        println!("\n{}", "=".repeat(60));
        println!("Source: {} ({})", source.name, source.url);
        println!("{}", "=".repeat(60));

        match scraper.fetch(source).await {
            Ok(elements) => {
                println!("✓ {} article elements", elements.len());
                raw.extend(elements);
            }
            Err(e) => println!("✗ Failed: {:#}", e),
        }
    }

    let fresh = filter_new_articles(
        &raw,
        &markup,
        PublicationDate::from(&config.filter),
        &state,
        &Default::default(),
    );

    println!("\n{} article(s) would be offered:", fresh.len());
    for (i, article) in fresh.iter().enumerate() {
        let published = article
            .candidate
            .published
            .map(|d| d.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!("  {}. [{}] {}", i + 1, published, article.candidate.title);
        println!("       {}", article.candidate.link);
        println!("       id {}", article.id);
    }

    Ok(())
}
