//! Command-line interface.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use indicatif::ProgressBar;
use tokio::sync::mpsc;
use url::Url;

use crate::config::CrawlConfig;
use crate::models::{DomainReport, FetchOutcome};
use crate::pipeline::{CrawlPipeline, HttpFetcher};

#[derive(Parser)]
#[command(name = "crawlpace")]
#[command(about = "Adaptive per-domain pacing and retry control for polite crawling")]
#[command(version)]
pub struct Cli {
    /// Config file path (TOML); built-in defaults are used when omitted
    #[arg(short, long, global = true, env = "CRAWLPACE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a set of URLs through the paced pipeline
    Run {
        /// Seed URLs to fetch
        urls: Vec<String>,

        /// File with one URL per line, in addition to positional URLs
        #[arg(long)]
        url_file: Option<PathBuf>,

        /// Stop after this many seeds
        #[arg(long)]
        limit: Option<usize>,

        /// Print per-domain backoff state as JSON when done
        #[arg(long)]
        json: bool,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = CrawlConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            urls,
            url_file,
            limit,
            json,
        } => cmd_run(config, urls, url_file, limit, json).await,
    }
}

async fn cmd_run(
    config: CrawlConfig,
    urls: Vec<String>,
    url_file: Option<PathBuf>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let seeds = collect_seeds(urls, url_file, limit)?;
    if seeds.is_empty() {
        bail!("no seed URLs given");
    }

    let fetcher = Arc::new(HttpFetcher::new(&config)?);
    let pipeline = CrawlPipeline::new(config, fetcher);
    let controller = pipeline.controller();
    let slots = pipeline.slots();

    let (outcome_tx, mut outcome_rx) = mpsc::channel(64);
    let progress = ProgressBar::new(seeds.len() as u64);
    let crawl = tokio::spawn(pipeline.run(seeds, outcome_tx));

    let mut fetched = 0usize;
    let mut observed = 0usize;
    let mut exhausted = 0usize;
    while let Some(outcome) = outcome_rx.recv().await {
        match &outcome {
            FetchOutcome::Delivered(response) if response.is_success() => fetched += 1,
            FetchOutcome::Delivered(_) => observed += 1,
            FetchOutcome::Exhausted { .. } => {
                exhausted += 1;
                progress.println(format!(
                    "{} {}",
                    style("gave up:").yellow().bold(),
                    outcome.url()
                ));
            }
        }
        progress.inc(1);
    }
    crawl.await.context("crawl task panicked")??;
    progress.finish_and_clear();

    println!(
        "{} {} fetched, {} non-success observed, {} exhausted",
        style("done:").green().bold(),
        fetched,
        observed,
        exhausted
    );

    if json {
        let penalties = controller.penalties().await;
        let delays = slots.delays().await;
        let mut report = BTreeMap::new();
        for (domain, delay) in delays {
            let penalty = penalties.get(&domain).copied().unwrap_or(0);
            report.insert(
                domain,
                DomainReport {
                    penalty,
                    slot_delay: delay.as_secs_f64(),
                },
            );
        }
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

/// Positional URLs plus the optional URL file, truncated to the limit.
fn collect_seeds(
    urls: Vec<String>,
    url_file: Option<PathBuf>,
    limit: Option<usize>,
) -> Result<Vec<Url>> {
    let mut seeds = Vec::new();
    for raw in urls {
        seeds.push(Url::parse(&raw).with_context(|| format!("invalid URL {raw}"))?);
    }
    if let Some(path) = url_file {
        let data = fs::read_to_string(&path)
            .with_context(|| format!("reading URL file {}", path.display()))?;
        for line in data.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            seeds.push(Url::parse(line).with_context(|| format!("invalid URL {line}"))?);
        }
    }
    if let Some(limit) = limit {
        seeds.truncate(limit);
    }
    Ok(seeds)
}
