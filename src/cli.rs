//! Command-line interface for the headline bot.
//!
//! Every path has a working-directory default, so a bare `headline_bot`
//! runs one posting cycle with `bot_config.json`, `posted_links.txt` and
//! `tweet_log.json`.

use clap::Parser;

/// Rank today's headlines from RSS feeds and post the best of them.
///
/// # Examples
///
/// ```sh
/// # One run with the default files
/// headline_bot
///
/// # Rank and log without posting or touching the ledger
/// headline_bot --dry-run
///
/// # Print statistics over the post log and ledger
/// headline_bot --stats
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the bot configuration (JSON, or YAML by extension)
    #[arg(short, long, default_value = "bot_config.json")]
    pub config: String,

    /// Path to the posted-links ledger
    #[arg(short, long, default_value = "posted_links.txt")]
    pub ledger: String,

    /// Path to the JSON post log
    #[arg(long, default_value = "tweet_log.json")]
    pub log_file: String,

    /// Optional path to the LLM client config.yaml
    #[arg(long)]
    pub llm_config: Option<String>,

    /// Name of the LLM template used to rewrite headlines
    #[arg(short, long, default_value = "social_post")]
    pub template: String,

    /// Log posts instead of publishing them and leave the ledger untouched
    #[arg(long)]
    pub dry_run: bool,

    /// Print post statistics and exit
    #[arg(long)]
    pub stats: bool,

    /// Bearer token for the posting API
    #[arg(long, env = "TWITTER_BEARER_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,
}
