//! Review crawler CLI
//!
//! `review-crawler run "<topic>"` runs one crawl and writes its results;
//! `review-crawler batch` runs one isolated crawl per subject.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use review_crawler::{
    telemetry, ContentCache, DuckDuckGoSearcher, FsCacheStorage, HttpFetcher, OllamaOracle,
    Pipeline, RunConfig, RunReport,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "review-crawler")]
#[command(about = "Crawl the web for user reviews about a topic")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one crawl
    Run {
        /// Topic to collect reviews for (e.g. "Apple Store Berlin reviews")
        query: String,

        /// Session id for the results folder (default: random)
        #[arg(long)]
        id: Option<String>,

        /// Start from these URLs instead of searching
        #[arg(long = "seed-url")]
        seed_urls: Vec<String>,

        #[command(flatten)]
        options: CrawlOptions,
    },

    /// Run one crawl per subject
    Batch {
        /// Topic template; `{}` is replaced by the subject
        #[arg(long, default_value = "Restaurants in {}")]
        topic_template: String,

        /// Subjects to crawl, one run each
        #[arg(long = "subject", required = true)]
        subjects: Vec<String>,

        /// Session id prefix (default: first word of the template)
        #[arg(long)]
        id_prefix: Option<String>,

        #[command(flatten)]
        options: CrawlOptions,
    },
}

#[derive(Args, Clone)]
struct CrawlOptions {
    /// Maximum number of reviews to collect
    #[arg(long, default_value_t = review_crawler::config::DEFAULT_MAX_REVIEWS)]
    max_reviews: usize,

    /// Never fetch URLs containing this substring (repeatable)
    #[arg(long = "forbidden-url")]
    forbidden_urls: Vec<String>,

    /// Use the topic verbatim as search query
    #[arg(long)]
    skip_query_generation: bool,

    /// Do not follow links to more reviews
    #[arg(long)]
    disable_discovery: bool,

    /// Page cache directory
    #[arg(long, default_value = "_html_cache")]
    cache_dir: PathBuf,

    /// Results directory
    #[arg(long, default_value = "results")]
    results_dir: PathBuf,
}

impl CrawlOptions {
    fn config(&self, query: &str, seed_urls: Vec<String>) -> Result<RunConfig> {
        let mut config = RunConfig::from_env(query)
            .context("Failed to read configuration from environment")?
            .with_max_reviews(self.max_reviews)
            .with_forbidden_urls(self.forbidden_urls.iter().cloned())
            .with_seed_urls(seed_urls)
            .with_cache_dir(&self.cache_dir)
            .with_results_dir(&self.results_dir);

        if self.skip_query_generation {
            config = config.skip_query_generation();
        }
        if self.disable_discovery {
            config = config.disable_discovery();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,review_crawler=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            query,
            id,
            seed_urls,
            options,
        } => {
            let session_id = id.unwrap_or_else(random_session_id);
            let config = options.config(&query, seed_urls)?;
            let folder = crawl(config, &session_id).await?;
            println!("Results saved to {}", folder.display());
        }
        Commands::Batch {
            topic_template,
            subjects,
            id_prefix,
            options,
        } => {
            let prefix = id_prefix.unwrap_or_else(|| default_prefix(&topic_template));
            let mut failures = 0;

            info!(runs = subjects.len(), "Starting batch");
            for subject in &subjects {
                let topic = topic_template.replace("{}", subject);
                let session_id = format!("{}_{}", prefix, slug(subject));
                info!(topic = %topic, session_id = %session_id, "Batch run starting");

                let result = match options.config(&topic, Vec::new()) {
                    Ok(config) => crawl(config, &session_id).await,
                    Err(e) => Err(e),
                };

                match result {
                    Ok(folder) => println!("[OK]     {subject}: {}", folder.display()),
                    Err(e) => {
                        failures += 1;
                        error!(subject = %subject, error = %format!("{e:#}"), "Batch run failed");
                        println!("[FAILED] {subject}: {e:#}");
                    }
                }
            }

            println!("{} of {} runs succeeded", subjects.len() - failures, subjects.len());
        }
    }

    Ok(())
}

/// Run one crawl and persist its results.
async fn crawl(config: RunConfig, session_id: &str) -> Result<PathBuf> {
    config.validate().context("Invalid run configuration")?;

    let oracle = OllamaOracle::from_settings(&config.oracle).context("Failed to create oracle")?;
    let fetcher = HttpFetcher::new().context("Failed to create HTTP fetcher")?;
    let cache = ContentCache::new(FsCacheStorage::new(&config.cache_dir), fetcher);
    let probes = telemetry::probe_factory(&config.telemetry);
    let results_dir = config.results_dir.clone();

    info!(
        session_id = %session_id,
        query = %config.query,
        max_reviews = config.max_reviews,
        model = %config.oracle.model,
        "Starting crawl"
    );

    let mut pipeline =
        Pipeline::new(config, oracle, DuckDuckGoSearcher::new(), cache).with_probe_factory(probes);
    let outcome = pipeline.run().await.context("Crawl failed")?;

    RunReport::from_outcome(outcome)
        .write(&results_dir, session_id)
        .await
        .context("Failed to write results")
}

fn random_session_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn default_prefix(template: &str) -> String {
    template
        .split_whitespace()
        .next()
        .filter(|w| !w.contains("{}"))
        .map(slug)
        .unwrap_or_else(|| "run".to_string())
}

fn slug(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}
