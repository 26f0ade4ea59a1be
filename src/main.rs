use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use clap::Parser;
use tracing::{info, warn};

use daily_scraper::cli::{Cli, Commands};
use daily_scraper::config::Config;
use daily_scraper::domain::Article;
use daily_scraper::errors::ScraperResult;
use daily_scraper::logging;
use daily_scraper::services::{DailyScraper, RetentionCleaner, ScrapeReport};
use daily_scraper::storage::{ArticleRepository, PurgeReport, SqliteArticleRepository, SqliteStorage};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> ScraperResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    logging::init(&config.log_level);

    match cli.command {
        Commands::Run {
            target,
            dry_run,
            output,
        } => cmd_run(config, target, dry_run, output).await,
        Commands::Cleanup { months, dry_run } => cmd_cleanup(&config, months, dry_run),
        Commands::Status => cmd_status(&config),
        Commands::Topics => cmd_topics(config).await,
    }
}

fn open_repository(config: &Config) -> ScraperResult<SqliteArticleRepository> {
    let storage = SqliteStorage::new(&config.db_path)?;
    Ok(SqliteArticleRepository::new(storage))
}

async fn cmd_run(
    config: Config,
    target: Option<usize>,
    dry_run: bool,
    output: Option<PathBuf>,
) -> ScraperResult<()> {
    let target = target.unwrap_or(config.target_article_count);

    let repository = if dry_run {
        None
    } else {
        Some(open_repository(&config)?)
    };

    if config.auto_cleanup_enabled {
        if let Some(ref repo) = repository {
            // a failed cleanup must not block today's scrape
            match RetentionCleaner::new(repo.clone()).cleanup(config.cleanup_months_old, false) {
                Ok(report) => info!(deleted = report.deleted, "auto-cleanup finished"),
                Err(e) => warn!(error = %e, "auto-cleanup failed"),
            }
        }
    }

    println!("Scraping up to {} articles...\n", target);

    let scraper = DailyScraper::new(config)?;
    let report = scraper.scrape_with_report(target).await;

    print_report(&report);

    if let Some(path) = output {
        let written = write_backup(&path, &report.articles)?;
        println!("Saved backup to {}", written.display());
    }

    if report.articles.is_empty() {
        println!("No articles scraped.");
        return Ok(());
    }

    match repository {
        Some(repo) => {
            let inserted = repo.upsert_articles(&report.articles)?;
            println!(
                "Stored {} articles ({} new, {} updated).",
                report.articles.len(),
                inserted,
                report.articles.len() - inserted
            );
        }
        None => println!("Dry run complete. Nothing was stored."),
    }

    println!("\nURLs:");
    for article in &report.articles {
        println!("{}", article.url);
    }

    Ok(())
}

fn print_report(report: &ScrapeReport) {
    for (i, article) in report.articles.iter().enumerate() {
        println!("{:>3}. {} [{}]", i + 1, article.title, article.source);
        if let Some(published) = article.published_at {
            println!("     Published: {}", published.format("%Y-%m-%d %H:%M UTC"));
        }
        println!("     Image: {}", article.image.as_deref().unwrap_or("none"));
        if !article.tags.is_empty() {
            println!("     Tags: {}", article.tags.join(", "));
        }
    }
    println!();
    println!(
        "{} articles, {} with images ({:.1}%)",
        report.articles.len(),
        report.with_images(),
        report.image_coverage
    );
    println!("Failures: {}\n", report.failures);
}

/// Write the articles as pretty JSON. A directory target gets a dated file name.
fn write_backup(path: &Path, articles: &[Article]) -> ScraperResult<PathBuf> {
    let file = if path.is_dir() {
        path.join(format!("articles_{}.json", Utc::now().format("%Y%m%d")))
    } else {
        path.to_path_buf()
    };

    let json = serde_json::to_string_pretty(articles)?;
    fs::write(&file, json)?;
    Ok(file)
}

fn cmd_cleanup(config: &Config, months: Option<u32>, dry_run: bool) -> ScraperResult<()> {
    let months = months.unwrap_or(config.cleanup_months_old);
    let repo = open_repository(config)?;
    let report = RetentionCleaner::new(repo).cleanup(months, dry_run)?;

    print_purge(&report, months, dry_run);
    Ok(())
}

fn print_purge(report: &PurgeReport, months: u32, dry_run: bool) {
    if report.matched == 0 {
        println!("No articles older than {} months.", months);
        return;
    }

    if dry_run {
        println!(
            "Dry run: would delete {} articles older than {} months.",
            report.matched, months
        );
    } else {
        println!(
            "Deleted {} articles older than {} months.",
            report.deleted, months
        );
    }

    for article in &report.sample {
        println!("  - {} ({})", article.title, article.scraped_at.format("%Y-%m-%d"));
    }
}

fn cmd_status(config: &Config) -> ScraperResult<()> {
    let repo = open_repository(config)?;
    let since = Utc::now() - Duration::days(7);

    let total = repo.count()?;
    let recent = repo.count_since(since)?;

    println!("Database: {}", config.db_path);
    println!("Total articles: {}", total);
    println!("Last 7 days: {}", recent);

    let articles = repo.query_recent(since, 50)?;
    if !articles.is_empty() {
        println!();
        for article in articles {
            println!(
                "  {} {} [{}]",
                article.scraped_at.format("%Y-%m-%d"),
                article.title,
                article.source
            );
        }
    }

    Ok(())
}

async fn cmd_topics(config: Config) -> ScraperResult<()> {
    let scraper = DailyScraper::new(config)?;
    let topics = scraper.trending_topics().await;

    if topics.is_empty() {
        println!("No trending topics available.");
        return Ok(());
    }

    println!("Trending topics:\n");
    for topic in topics {
        println!("  {}", topic);
    }

    Ok(())
}
