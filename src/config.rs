//! Run configuration.
//!
//! A [`RunConfig`] is read once per run and handed to the pipeline by value;
//! nothing in the pipeline reaches for process-wide settings. The file format
//! follows the extension: `.yaml`/`.yml` is YAML, anything else is JSON.
//! Keys missing from the file fall back to [`RunConfig::default`].

use crate::models::FeedSource;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument, warn};

/// India Standard Time, in minutes east of UTC.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

const DEFAULT_FEEDS: &[(&str, &str)] = &[
    ("https://indianexpress.com/section/business/budget/feed/", "business"),
    ("https://indianexpress.com/section/business/feed/", "business"),
    ("https://indianexpress.com/section/world/climate-change/feed/", "world"),
    ("https://indianexpress.com/section/business/companies/feed/", "business"),
    ("https://indianexpress.com/section/business/economy/feed/", "business"),
    ("https://indianexpress.com/elections/feed/", "politics"),
    ("https://indianexpress.com/section/entertainment/feed/", "entertainment"),
    ("https://indianexpress.com/section/education/festivals/feed/", "education"),
    ("https://indianexpress.com/section/india/feed/", "india"),
    ("https://indianexpress.com/section/technology/feed/", "technology"),
    ("https://indianexpress.com/section/trending/feed/", "trending"),
    ("https://indianexpress.com/section/trending/trending-in-india/feed/", "trending"),
    ("https://indianexpress.com/section/trending/trending-globally/feed/", "trending"),
];

const DEFAULT_KEYWORDS: &[&str] = &[
    "Modi", "Donald Trump", "Trump", "Narendra Modi", "Airstrike", "Rahul Gandhi",
    "stock market", "crash", "earthquake", "crypto", "flood", "AI", "ban", "twitter",
    "India vs Pakistan", "inflation", "budget", "Elon Musk", "ISRO", "NASA", "Adani",
    "Ambani", "war", "Boycott", "Supreme Court", "BJP",
];

const DEFAULT_WEIGHTS: &[(&str, f64)] = &[
    ("trending", 5.0),
    ("politics", 5.0),
    ("india", 4.0),
    ("world", 4.0),
    ("business", 4.0),
    ("entertainment", 3.0),
    ("technology", 3.0),
    ("education", 2.0),
];

/// How selected posts leave the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishMethod {
    /// Post through the HTTP posting API.
    Api,
    /// Log the post and report success without sending anything.
    DryRun,
    /// Browser automation. Not supported; runs as [`PublishMethod::DryRun`].
    Selenium,
}

/// Everything a single run needs to know, read-only for the run's duration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    pub rss_feeds: Vec<FeedSource>,
    pub priority_keywords: Vec<String>,
    pub category_weights: BTreeMap<String, f64>,
    /// Posts per run. Zero or negative posts nothing.
    pub tweets_per_run: i64,
    /// 1 = today only, 2 = today and yesterday. Zero or negative keeps nothing
    /// dated today or earlier.
    pub max_news_age: i64,
    pub tweet_method: PublishMethod,
    /// Seconds between posts.
    pub tweet_delay: u64,
    pub utc_offset_minutes: i32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            rss_feeds: DEFAULT_FEEDS
                .iter()
                .map(|(url, category)| FeedSource::new(url, category))
                .collect(),
            priority_keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            category_weights: DEFAULT_WEIGHTS
                .iter()
                .map(|(c, w)| (c.to_string(), *w))
                .collect(),
            tweets_per_run: 3,
            max_news_age: 2,
            tweet_method: PublishMethod::Api,
            tweet_delay: 300,
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
        }
    }
}

impl RunConfig {
    /// The bot's fixed time zone. Out-of-range offsets fall back to IST.
    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
            .or_else(|| FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60))
            .expect("IST offset is in range")
    }

    /// How many articles to select; negative counts select none.
    pub fn post_count(&self) -> usize {
        usize::try_from(self.tweets_per_run).unwrap_or(0)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.tweet_delay)
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Parse a config document; the format is picked from `path`'s extension.
pub fn parse_config(path: &Path, text: &str) -> Result<RunConfig, Box<dyn Error>> {
    if is_yaml(path) {
        Ok(serde_yaml::from_str(text)?)
    } else {
        Ok(serde_json::from_str(text)?)
    }
}

fn render_config(path: &Path, config: &RunConfig) -> Result<String, Box<dyn Error>> {
    if is_yaml(path) {
        Ok(serde_yaml::to_string(config)?)
    } else {
        Ok(serde_json::to_string_pretty(config)?)
    }
}

/// Load the run configuration, writing the defaults out when the file is missing.
///
/// Never fails: an unreadable or invalid file is reported and the defaults
/// are used instead, so a broken config cannot stop a scheduled run.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_or_init(path: &Path) -> RunConfig {
    if !path.exists() {
        let config = RunConfig::default();
        match render_config(path, &config) {
            Ok(text) => match fs::write(path, text).await {
                Ok(()) => info!("Default configuration saved"),
                Err(e) => warn!(error = %e, "Could not save default configuration"),
            },
            Err(e) => warn!(error = %e, "Could not serialize default configuration"),
        }
        return config;
    }

    let loaded = match fs::read_to_string(path).await {
        Ok(text) => parse_config(path, &text),
        Err(e) => Err(e.into()),
    };
    match loaded {
        Ok(config) => {
            info!(
                feeds = config.rss_feeds.len(),
                keywords = config.priority_keywords.len(),
                "Configuration loaded"
            );
            config
        }
        Err(e) => {
            warn!(error = %e, "Error loading configuration; using defaults");
            RunConfig::default()
        }
    }
}
