//! Feed ingestion and normalization.
//!
//! Ingestion runs in two phases per source:
//!
//! 1. **Fetching**: a [`FeedFetcher`] turns the source URL into [`RawEntry`]s
//! 2. **Normalizing**: entries without a date or link, entries older than the
//!    age window, and links already seen this run or posted today are
//!    dropped; survivors become [`Article`]s tagged with the source category
//!
//! A source that fails to fetch or parse is logged and contributes nothing;
//! it never stops the other sources. Articles come out in arrival order and
//! unscored.

use crate::models::{Article, FeedSource, RawEntry};
use crate::utils::{excerpt, plain_text};
use chrono::{FixedOffset, NaiveDate, TimeDelta};
use feed_rs::model::{Entry, Feed, Link};
use reqwest::Client;
use std::collections::HashSet;
use std::error::Error;
use std::time::Duration as StdDuration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Source of feed entries for a URL.
pub trait FeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<RawEntry>, Box<dyn Error>>;
}

/// Fetches feeds over HTTP and parses them with `feed-rs`.
#[derive(Debug, Clone)]
pub struct HttpFeedFetcher {
    http: Client,
}

impl HttpFeedFetcher {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let http = Client::builder()
            .timeout(StdDuration::from_secs(20))
            .user_agent(concat!("headline_bot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }
}

impl FeedFetcher for HttpFeedFetcher {
    #[instrument(level = "info", skip(self))]
    async fn fetch(&self, url: &str) -> Result<Vec<RawEntry>, Box<dyn Error>> {
        let bytes = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let feed = feed_rs::parser::parse(&bytes[..])?;
        Ok(entries_from_feed(url, feed))
    }
}

/// Convert a parsed feed into raw entries.
pub fn entries_from_feed(feed_url: &str, feed: Feed) -> Vec<RawEntry> {
    let base = Url::parse(feed_url).ok();
    feed.entries
        .into_iter()
        .map(|entry| raw_entry(base.as_ref(), entry))
        .collect()
}

/// The article link: an `alternate` (or rel-less) link first, then any
/// other link except `self`, then an id that looks like a URL.
fn raw_entry(base: Option<&Url>, entry: Entry) -> RawEntry {
    let usable = |l: &&Link| !l.href.trim().is_empty();
    let link = entry
        .links
        .iter()
        .filter(usable)
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| {
            entry
                .links
                .iter()
                .filter(usable)
                .find(|l| l.rel.as_deref() != Some("self"))
        })
        .map(|l| resolve_link(base, l.href.trim()))
        .or_else(|| {
            (entry.id.starts_with("http://") || entry.id.starts_with("https://"))
                .then(|| entry.id.clone())
        });

    RawEntry {
        title: entry.title.map(|t| t.content),
        link,
        summary: entry.summary.map(|s| s.content),
        published: entry.published.or(entry.updated),
    }
}

/// Absolute links are kept verbatim; relative ones are joined onto the feed URL.
fn resolve_link(base: Option<&Url>, href: &str) -> String {
    if Url::parse(href).is_ok() {
        return href.to_string();
    }
    base.and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}

/// Oldest publication date still inside the window, saturating at the
/// calendar limits.
fn age_cutoff(today: NaiveDate, max_age_days: i64) -> NaiveDate {
    let span = max_age_days.saturating_sub(1);
    TimeDelta::try_days(span)
        .and_then(|d| today.checked_sub_signed(d))
        .unwrap_or(if span < 0 { NaiveDate::MAX } else { NaiveDate::MIN })
}

/// Per-run filtering state shared across all sources.
#[derive(Debug)]
pub struct Normalizer<'a> {
    tz: FixedOffset,
    oldest: NaiveDate,
    posted_today: &'a HashSet<String>,
    seen: HashSet<String>,
}

impl<'a> Normalizer<'a> {
    /// Entries dated on or after `today - (max_age_days - 1)` are kept.
    ///
    /// 1 keeps only `today`, 2 adds yesterday. 0 or less puts the cutoff
    /// after `today`, so nothing published up to today survives.
    pub fn new(
        tz: FixedOffset,
        today: NaiveDate,
        max_age_days: i64,
        posted_today: &'a HashSet<String>,
    ) -> Self {
        Self {
            tz,
            oldest: age_cutoff(today, max_age_days),
            posted_today,
            seen: HashSet::new(),
        }
    }

    /// Turn one entry into an article, or `None` if it must be dropped.
    pub fn normalize(&mut self, entry: RawEntry, category: &str) -> Option<Article> {
        let Some(published) = entry.published else {
            debug!(title = ?entry.title, "Skipping entry without a publication date");
            return None;
        };
        let published_date = published.with_timezone(&self.tz).date_naive();
        if published_date < self.oldest {
            return None;
        }

        let link = entry.link.unwrap_or_default();
        if link.is_empty() || self.seen.contains(&link) || self.posted_today.contains(&link) {
            return None;
        }

        let raw_summary = entry.summary.as_deref().map(plain_text).unwrap_or_default();
        let article = Article {
            title: entry.title.unwrap_or_default().trim().to_string(),
            summary_excerpt: excerpt(&raw_summary),
            raw_summary,
            link: link.clone(),
            published_date,
            category: category.to_string(),
            score: 0.0,
        };
        self.seen.insert(link);
        Some(article)
    }
}

/// Fetch every source and return the surviving articles in arrival order.
#[instrument(level = "info", skip_all, fields(sources = sources.len(), %today, max_age_days = max_age_days))]
pub async fn ingest<F: FeedFetcher>(
    fetcher: &F,
    sources: &[FeedSource],
    max_age_days: i64,
    posted_today: &HashSet<String>,
    today: NaiveDate,
    tz: FixedOffset,
) -> Vec<Article> {
    let mut normalizer = Normalizer::new(tz, today, max_age_days, posted_today);
    let mut articles = Vec::new();

    for source in sources {
        info!(url = %source.url, "Fetching feed");
        let entries = match fetcher.fetch(&source.url).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(url = %source.url, error = %e, "Error parsing feed; skipping source");
                continue;
            }
        };
        let before = articles.len();
        articles.extend(
            entries
                .into_iter()
                .filter_map(|entry| normalizer.normalize(entry, &source.category)),
        );
        debug!(url = %source.url, kept = articles.len() - before, "Normalized feed entries");
    }

    info!(count = articles.len(), "Found news items");
    articles
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashMap;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        ist().with_ymd_and_hms(y, m, d, h, 0, 0).unwrap().with_timezone(&Utc)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    fn entry(link: &str, published: Option<DateTime<Utc>>) -> RawEntry {
        RawEntry {
            title: Some(format!("Story {link}")),
            link: Some(link.to_string()),
            summary: Some("One. Two. Three.".to_string()),
            published,
        }
    }

    /// Serves canned entries per URL; unknown URLs fail like a dead feed.
    struct StubFetcher(HashMap<String, Vec<RawEntry>>);

    impl FeedFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<RawEntry>, Box<dyn Error>> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| format!("connection refused: {url}").into())
        }
    }

    #[test]
    fn test_age_window_keeps_today_and_yesterday() {
        let posted = HashSet::new();
        let mut n = Normalizer::new(ist(), today(), 2, &posted);

        assert!(n.normalize(entry("a", Some(at(2024, 6, 10, 8))), "india").is_some());
        assert!(n.normalize(entry("b", Some(at(2024, 6, 9, 23))), "india").is_some());
        assert!(n.normalize(entry("c", Some(at(2024, 6, 8, 12))), "india").is_none());
    }

    #[test]
    fn test_max_age_one_keeps_only_today() {
        let posted = HashSet::new();
        let mut n = Normalizer::new(ist(), today(), 1, &posted);
        assert!(n.normalize(entry("a", Some(at(2024, 6, 10, 1))), "india").is_some());
        assert!(n.normalize(entry("b", Some(at(2024, 6, 9, 23))), "india").is_none());
    }

    #[test]
    fn test_max_age_zero_drops_same_day_entries() {
        let posted = HashSet::new();
        let mut n = Normalizer::new(ist(), today(), 0, &posted);
        assert!(n.normalize(entry("a", Some(at(2024, 6, 10, 8))), "india").is_none());
        assert!(n.normalize(entry("b", Some(at(2024, 6, 9, 8))), "india").is_none());

        let mut n = Normalizer::new(ist(), today(), -5, &posted);
        assert!(n.normalize(entry("c", Some(at(2024, 6, 10, 8))), "india").is_none());
    }

    #[test]
    fn test_huge_max_age_keeps_old_entries() {
        let posted = HashSet::new();
        let mut n = Normalizer::new(ist(), today(), i64::MAX, &posted);
        assert!(n.normalize(entry("a", Some(at(2001, 1, 1, 8))), "india").is_some());
    }

    #[test]
    fn test_date_is_taken_in_fixed_zone() {
        let posted = HashSet::new();
        let mut n = Normalizer::new(ist(), today(), 1, &posted);
        // 2024-06-09 20:00 UTC is 2024-06-10 01:30 in IST.
        let late_utc = Utc.with_ymd_and_hms(2024, 6, 9, 20, 0, 0).unwrap();
        let article = n.normalize(entry("a", Some(late_utc)), "india").unwrap();
        assert_eq!(article.published_date, today());
    }

    #[test]
    fn test_entries_without_date_or_link_are_dropped() {
        let posted = HashSet::new();
        let mut n = Normalizer::new(ist(), today(), 2, &posted);
        assert!(n.normalize(entry("a", None), "india").is_none());

        let mut no_link = entry("", Some(at(2024, 6, 10, 8)));
        assert!(n.normalize(no_link.clone(), "india").is_none());
        no_link.link = None;
        assert!(n.normalize(no_link, "india").is_none());
    }

    #[test]
    fn test_posted_today_links_are_excluded() {
        let posted: HashSet<String> = ["a".to_string()].into_iter().collect();
        let mut n = Normalizer::new(ist(), today(), 2, &posted);
        assert!(n.normalize(entry("a", Some(at(2024, 6, 10, 8))), "india").is_none());
        assert!(n.normalize(entry("b", Some(at(2024, 6, 10, 8))), "india").is_some());
    }

    #[test]
    fn test_article_fields_are_derived() {
        let posted = HashSet::new();
        let mut n = Normalizer::new(ist(), today(), 2, &posted);
        let mut raw = entry("https://example.com/x", Some(at(2024, 6, 10, 8)));
        raw.title = Some("  Padded title ".to_string());
        let article = n.normalize(raw, "business").unwrap();

        assert_eq!(article.title, "Padded title");
        assert_eq!(article.summary_excerpt, "One. Two.");
        assert_eq!(article.raw_summary, "One. Two. Three.");
        assert_eq!(article.category, "business");

        let mut bare = entry("https://example.com/y", Some(at(2024, 6, 10, 8)));
        bare.summary = None;
        let article = n.normalize(bare, "business").unwrap();
        assert_eq!(article.summary_excerpt, "More details in the article.");
    }

    #[tokio::test]
    async fn test_duplicate_links_across_sources_keep_first() {
        let when = Some(at(2024, 6, 10, 9));
        let fetcher = StubFetcher(HashMap::from([
            ("https://feeds/a".to_string(), vec![entry("https://x/1", when)]),
            (
                "https://feeds/b".to_string(),
                vec![entry("https://x/1", when), entry("https://x/2", when)],
            ),
        ]));
        let sources = vec![
            FeedSource::new("https://feeds/a", "business"),
            FeedSource::new("https://feeds/b", "politics"),
        ];

        let articles = ingest(&fetcher, &sources, 2, &HashSet::new(), today(), ist()).await;
        let links: Vec<&str> = articles.iter().map(|a| a.link.as_str()).collect();
        assert_eq!(links, vec!["https://x/1", "https://x/2"]);
        assert_eq!(articles[0].category, "business");
    }

    #[tokio::test]
    async fn test_failing_source_is_isolated() {
        let when = Some(at(2024, 6, 10, 9));
        let fetcher = StubFetcher(HashMap::from([(
            "https://feeds/ok".to_string(),
            vec![entry("https://x/1", when)],
        )]));
        let sources = vec![
            FeedSource::new("https://feeds/down", "world"),
            FeedSource::new("https://feeds/ok", "world"),
        ];

        let articles = ingest(&fetcher, &sources, 2, &HashSet::new(), today(), ist()).await;
        assert_eq!(articles.len(), 1);
    }

    #[tokio::test]
    async fn test_ledger_exclusion_only_applies_to_given_set() {
        let when = Some(at(2024, 6, 10, 9));
        let fetcher = StubFetcher(HashMap::from([(
            "https://feeds/a".to_string(),
            vec![entry("https://x/today", when), entry("https://x/yesterday", when)],
        )]));
        let sources = vec![FeedSource::new("https://feeds/a", "india")];
        let ledger_text = "2024-06-10|https://x/today\n2024-06-09|https://x/yesterday\n";
        let posted = crate::ledger::links_for_date(ledger_text, today());

        let articles = ingest(&fetcher, &sources, 2, &posted, today(), ist()).await;
        let links: Vec<&str> = articles.iter().map(|a| a.link.as_str()).collect();
        assert_eq!(links, vec!["https://x/yesterday"]);
    }

    #[test]
    fn test_entries_from_rss_document() {
        let rss = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Section</title>
    <link>https://news.example.com/</link>
    <description>Test feed</description>
    <item>
      <title>Budget announced</title>
      <link>https://news.example.com/budget</link>
      <description>&lt;p&gt;The budget is out. Markets react. More soon.&lt;/p&gt;</description>
      <pubDate>Mon, 10 Jun 2024 04:30:00 GMT</pubDate>
    </item>
    <item>
      <title>Relative link</title>
      <link>/story/relative</link>
      <pubDate>Mon, 10 Jun 2024 05:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Undated</title>
      <link>https://news.example.com/undated</link>
    </item>
  </channel>
</rss>"#;
        let feed = feed_rs::parser::parse(rss.as_bytes()).unwrap();
        let entries = entries_from_feed("https://news.example.com/section/feed/", feed);

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].title.as_deref(), Some("Budget announced"));
        assert_eq!(entries[0].link.as_deref(), Some("https://news.example.com/budget"));
        assert_eq!(
            entries[0].published,
            Some(Utc.with_ymd_and_hms(2024, 6, 10, 4, 30, 0).unwrap())
        );
        assert_eq!(entries[1].link.as_deref(), Some("https://news.example.com/story/relative"));
        assert!(entries[2].published.is_none());

        let posted = HashSet::new();
        let mut n = Normalizer::new(ist(), today(), 2, &posted);
        let article = n.normalize(entries[0].clone(), "business").unwrap();
        assert_eq!(article.summary_excerpt, "The budget is out. Markets react.");
    }

    #[test]
    fn test_atom_entry_prefers_alternate_link() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Section</title>
  <id>urn:feed</id>
  <updated>2024-06-10T05:00:00Z</updated>
  <entry>
    <title>Podcast episode</title>
    <id>urn:entry:1</id>
    <updated>2024-06-10T05:00:00Z</updated>
    <link rel="enclosure" href="https://cdn.example.com/ep1.mp3"/>
    <link rel="replies" href="https://news.example.com/ep1/comments"/>
    <link rel="alternate" href="https://news.example.com/ep1"/>
  </entry>
  <entry>
    <title>Only replies</title>
    <id>urn:entry:2</id>
    <updated>2024-06-10T05:00:00Z</updated>
    <link rel="self" href="https://news.example.com/api/2"/>
    <link rel="replies" href="https://news.example.com/ep2/comments"/>
  </entry>
</feed>"#;
        let feed = feed_rs::parser::parse(atom.as_bytes()).unwrap();
        let entries = entries_from_feed("https://news.example.com/feed.atom", feed);

        assert_eq!(entries[0].link.as_deref(), Some("https://news.example.com/ep1"));
        assert_eq!(
            entries[1].link.as_deref(),
            Some("https://news.example.com/ep2/comments")
        );
    }
}
