//! One bot run, end to end.
//!
//! 1. **Ledger**: load the links already scheduled today
//! 2. **Ingest**: fetch and normalize every configured feed
//! 3. **Rank**: score each article and keep the top `tweets_per_run`
//! 4. **Record**: append the selected links to the ledger
//! 5. **Publish**: rewrite, publish and log each selected article in order,
//!    pausing `tweet_delay` between posts
//!
//! The ledger is written in step 4, before anything is published. If the
//! process dies mid-loop, the unpublished links stay recorded and are not
//! retried today: the bot would rather miss a post than duplicate one.

use crate::config::RunConfig;
use crate::ingest::{FeedFetcher, ingest};
use crate::ledger::DedupLedger;
use crate::models::{Article, PostRecord};
use crate::outputs::json::PostLog;
use crate::publish::Publisher;
use crate::rewrite::{Rewriter, fallback_post};
use crate::scoring::{KeywordSet, score_all, select};
use crate::utils::{now_in, truncate_for_log};
use chrono::{FixedOffset, NaiveDate};
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Post text recorded when an item fails outright.
pub const FAILED_POST_SENTINEL: &str = "ERROR";

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub found: usize,
    pub selected: usize,
    pub published: usize,
    pub failed: usize,
}

/// The external capabilities a run is wired to.
pub struct Pipeline<F, R, P> {
    pub fetcher: F,
    pub rewriter: R,
    pub publisher: P,
    pub ledger: DedupLedger,
    pub post_log: PostLog,
}

impl<F, R, P> Pipeline<F, R, P>
where
    F: FeedFetcher,
    R: Rewriter,
    P: Publisher,
{
    /// Rank today's news and publish the best of it.
    #[instrument(level = "info", skip_all, fields(%today))]
    pub async fn run<G: Rng + ?Sized>(
        &self,
        config: &RunConfig,
        today: NaiveDate,
        rng: &mut G,
    ) -> RunSummary {
        let tz = config.timezone();
        let posted_today = self.ledger.load_today(today).await;

        let mut articles = ingest(
            &self.fetcher,
            &config.rss_feeds,
            config.max_news_age,
            &posted_today,
            today,
            tz,
        )
        .await;

        let keywords = KeywordSet::new(&config.priority_keywords);
        score_all(&mut articles, &keywords, &config.category_weights, rng);
        let selected = select(&articles, config.post_count());

        let mut summary = RunSummary {
            found: articles.len(),
            selected: selected.len(),
            ..RunSummary::default()
        };
        if selected.is_empty() {
            info!("No news items found to post");
            return summary;
        }
        info!(count = selected.len(), "Selected news items to post");

        if self.publisher.is_dry_run() {
            info!("Dry run: ledger left untouched");
        } else {
            let links: Vec<String> = selected.iter().map(|a| a.link.clone()).collect();
            if let Err(e) = self.ledger.append(&links, today).await {
                error!(error = %e, "Error saving posted links; continuing with publish");
            }
        }

        let (published, failed) = self.publish_all(&selected, config.delay(), tz).await;
        summary.published = published;
        summary.failed = failed;
        summary
    }

    /// Rewrite, publish and log each article in order.
    ///
    /// Returns `(published, failed)`. Nothing in here aborts the loop. Dry
    /// runs write no post log records.
    pub async fn publish_all(
        &self,
        selected: &[Article],
        delay: Duration,
        tz: FixedOffset,
    ) -> (usize, usize) {
        let total = selected.len();
        let (mut published, mut failed) = (0, 0);

        for (i, article) in selected.iter().enumerate() {
            let n = i + 1;
            let text = match self.rewriter.rewrite(article).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, link = %article.link, "Rewrite unavailable; using fallback post");
                    fallback_post(article)
                }
            };
            info!(
                item = n,
                total,
                link = %article.link,
                post = %truncate_for_log(&text, 120),
                "Publishing news item"
            );

            let record = match self.publisher.publish(&text).await {
                Ok(true) => {
                    published += 1;
                    info!(item = n, total, "Post published");
                    PostRecord::new(now_in(tz), article, &text, true)
                }
                Ok(false) => {
                    failed += 1;
                    warn!(item = n, total, "Post was not accepted");
                    PostRecord::new(now_in(tz), article, &text, false)
                }
                Err(e) => {
                    failed += 1;
                    error!(item = n, total, error = %e, "Error publishing post");
                    PostRecord::new(now_in(tz), article, FAILED_POST_SENTINEL, false)
                }
            };
            if self.publisher.is_dry_run() {
                debug!(link = %record.link, "Dry run: post log left untouched");
            } else if let Err(e) = self.post_log.append(record).await {
                warn!(error = %e, "Error writing post log");
            }

            if n < total {
                info!(seconds = delay.as_secs(), "Waiting before next post");
                sleep(delay).await;
            }
        }

        info!(published, failed, "Publish loop completed");
        (published, failed)
    }
}
