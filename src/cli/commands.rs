use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "daily-scraper")]
#[command(about = "Multi-source daily news aggregator with image backfilling")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scrape today's articles from every enabled source and store them
    Run {
        /// Number of articles to keep (defaults to TARGET_ARTICLE_COUNT)
        #[arg(short, long)]
        target: Option<usize>,

        /// Dry run - scrape and print, but don't touch the database
        #[arg(long)]
        dry_run: bool,

        /// Write a JSON backup to this file, or into this directory as articles_YYYYMMDD.json
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete stored articles older than the retention window
    Cleanup {
        /// Retention in 30-day months (defaults to CLEANUP_MONTHS_OLD)
        #[arg(short, long)]
        months: Option<u32>,

        /// Only report what would be deleted
        #[arg(long)]
        dry_run: bool,
    },

    /// Show how many articles are stored and list the last week's
    Status,

    /// Print trending topics from the news API
    Topics,
}
