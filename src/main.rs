//! # Headline Bot
//!
//! Pulls today's headlines from a list of RSS feeds, ranks them by priority
//! keywords and category weight, and posts the best few to a social feed.
//!
//! ## Usage
//!
//! ```sh
//! headline_bot --config bot_config.json
//! ```
//!
//! ## Architecture
//!
//! 1. **Ingest**: fetch every feed, keep entries from the recent window that
//!    have not been posted today
//! 2. **Rank**: keyword hits and category weight plus a little jitter
//! 3. **Record**: write the chosen links to the dedup ledger
//! 4. **Publish**: rewrite each headline through the LLM (template fallback),
//!    publish it, log the outcome, wait between posts

use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod ingest;
mod ledger;
mod models;
mod outputs;
mod pipeline;
mod publish;
mod rewrite;
mod scoring;
mod utils;

use cli::Cli;
use ingest::HttpFeedFetcher;
use ledger::DedupLedger;
use outputs::json::PostLog;
use outputs::stats::BotStats;
use pipeline::Pipeline;
use publish::AnyPublisher;
use rewrite::LlmRewriter;
use utils::{now_in, today_in};

#[tokio::main]
async fn main() {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    debug!(?args.config, ?args.ledger, ?args.log_file, dry_run = args.dry_run, "Parsed CLI arguments");

    if let Err(e) = run(args).await {
        error!(error = %e, "Run failed");
        std::process::exit(1);
    }
}

#[instrument(level = "info", skip_all)]
async fn run(args: Cli) -> Result<(), Box<dyn Error>> {
    let start_time = std::time::Instant::now();

    let config = config::load_or_init(Path::new(&args.config)).await;
    let tz = config.timezone();
    let today = today_in(tz);
    let ledger = DedupLedger::new(&args.ledger);
    let post_log = PostLog::new(&args.log_file);

    if args.stats {
        let records = post_log.read_all().await;
        let stats = BotStats::collect(&records, ledger.total_records().await, today);
        println!("{stats}");
        return Ok(());
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        feeds = config.rss_feeds.len(),
        count = config.tweets_per_run,
        method = ?config.tweet_method,
        dry_run = args.dry_run,
        local_time = %now_in(tz).format("%H:%M:%S %:z"),
        "headline_bot starting up"
    );

    let rewriter = match LlmRewriter::load(args.llm_config.as_deref(), &args.template).await {
        Ok(r) => Some(r),
        Err(e) => {
            warn!(error = %e, "LLM rewriter unavailable; posts will use the fallback template");
            None
        }
    };

    let pipeline = Pipeline {
        fetcher: HttpFeedFetcher::new()?,
        rewriter,
        publisher: AnyPublisher::from_method(config.tweet_method, args.dry_run, args.api_token)?,
        ledger,
        post_log,
    };

    let summary = pipeline.run(&config, today, &mut rand::rng()).await;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        found = summary.found,
        selected = summary.selected,
        published = summary.published,
        failed = summary.failed,
        "Execution complete"
    );

    Ok(())
}
