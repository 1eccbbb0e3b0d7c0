//! Data models shared across the pipeline.
//!
//! - [`FeedSource`]: a configured feed URL and the category it contributes
//! - [`RawEntry`]: one feed entry as fetched, before normalization
//! - [`Article`]: a normalized entry flowing through scoring and selection
//! - [`PostRecord`]: one publish attempt as written to the post log

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A feed URL paired with the category its articles are tagged with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeedSource {
    pub url: String,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    "general".to_string()
}

impl FeedSource {
    pub fn new(url: &str, category: &str) -> Self {
        Self {
            url: url.to_string(),
            category: category.to_string(),
        }
    }
}

/// A feed entry reduced to the fields the ingestor looks at.
///
/// Every field is optional because feeds are not trusted to carry them;
/// the ingestor decides what to drop.
#[derive(Debug, Clone, Default)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

/// A normalized news article.
///
/// `raw_summary` is kept alongside the excerpt because keyword scoring looks
/// at the whole summary, while the excerpt is what gets posted.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub title: String,
    pub summary_excerpt: String,
    pub raw_summary: String,
    pub link: String,
    pub published_date: NaiveDate,
    pub category: String,
    pub score: f64,
}

/// One entry in the post log.
///
/// Field names match the log file consumed by the dashboard, hence `tweet`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PostRecord {
    pub timestamp: String,
    pub title: String,
    pub link: String,
    pub tweet: String,
    pub success: bool,
}

impl PostRecord {
    pub fn new(at: DateTime<FixedOffset>, article: &Article, text: &str, success: bool) -> Self {
        Self {
            timestamp: at.to_rfc3339(),
            title: article.title.clone(),
            link: article.link.clone(),
            tweet: text.to_string(),
            success,
        }
    }
}
