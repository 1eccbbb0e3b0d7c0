//! Turning selected articles into post text.
//!
//! The generative path sends a prompt to an OpenAI-compatible endpoint via
//! `awful_aj`, wrapped in [`RetryAsk`] for exponential backoff. When that
//! path is unavailable or fails, [`fallback_post`] builds a plain templated
//! post so publishing can still go ahead.
//!
//! # Retry Strategy
//!
//! - Maximum 5 retry attempts
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to each delay

use crate::models::Article;
use crate::utils::{truncate_chars, upcase};
use awful_aj::api::ask;
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use rand::{Rng, rng};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Hard limit on post length, in characters.
pub const MAX_POST_CHARS: usize = 280;

/// One round trip to a text-generation backend.
///
/// The rewrite path only ever needs "send a prompt, get text back", so this
/// is the seam where retries and test doubles plug in.
pub trait AskAsync {
    /// What the backend hands back; a plain `String` for chat completions.
    type Response;

    /// Send `text` as the user turn and wait for the completion.
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Retries a flaky [`AskAsync`] with capped exponential backoff.
///
/// Rate limits and gateway timeouts from hosted models tend to clear within
/// seconds, so a rewrite is retried before the caller falls back to the
/// template post. Waits between attempts:
///
/// ```text
/// wait(n) = min(base_delay * 2^(n-1), max_delay) + jitter(0..=250ms)
/// ```
///
/// With `max_retries = 5` the backend is called at most six times.
pub struct RetryAsk<T> {
    inner: T,
    /// Retries after the first attempt.
    max_retries: usize,
    /// Wait before the first retry; doubles each time.
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Wrap `inner`; the backoff cap is 30 seconds.
    ///
    /// ```ignore
    /// let client = AskFnWrapper { config: &cfg, template: &tpl };
    /// let post = RetryAsk::new(client, 5, Duration::from_secs(1)).ask(&prompt).await?;
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    /// Wait before retry number `attempt` (1-based), without jitter.
    fn backoff(&self, attempt: usize) -> StdDuration {
        let shift = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX).min(31);
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    type Response = T::Response;

    /// The last error is returned once the retries are spent.
    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let started = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_started = Instant::now();
            let err = match self.inner.ask(text).await {
                Ok(resp) => return Ok(resp),
                Err(e) => e,
            };
            attempt += 1;

            if attempt > self.max_retries {
                error!(
                    attempt,
                    max = self.max_retries,
                    elapsed_ms_total = started.elapsed().as_millis() as u64,
                    error = %err,
                    "Rewrite request failed; retries exhausted"
                );
                return Err(err);
            }

            let jitter = StdDuration::from_millis(rng().random_range(0..=250));
            let wait = self.backoff(attempt) + jitter;
            warn!(
                attempt,
                max = self.max_retries,
                elapsed_ms_attempt = attempt_started.elapsed().as_millis() as u64,
                ?wait,
                error = %err,
                "Rewrite request failed; backing off"
            );
            sleep(wait).await;
        }
    }
}

/// [`AskAsync`] over `awful_aj::api::ask`, borrowing the loaded config and
/// chat template for the length of one rewrite.
#[derive(Debug)]
pub struct AskFnWrapper<'a> {
    /// Endpoint, key and model settings.
    pub config: &'a AwfulJadeConfig,
    /// System prompt and message scaffolding for post rewriting.
    pub template: &'a ChatTemplate,
}

impl<'a> AskAsync for AskFnWrapper<'a> {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = ask(self.config, text.to_string(), self.template, None, None).await;
        if let Err(e) = &res {
            warn!(elapsed_ms = t0.elapsed().as_millis() as u64, error = %e, "Chat completion call failed");
        }
        res
    }
}

/// Produces post text for an article.
pub trait Rewriter {
    async fn rewrite(&self, article: &Article) -> Result<String, Box<dyn Error>>;
}

/// No generative service configured: every rewrite fails, so the caller
/// always lands on [`fallback_post`].
impl<R: Rewriter> Rewriter for Option<R> {
    async fn rewrite(&self, article: &Article) -> Result<String, Box<dyn Error>> {
        match self {
            Some(inner) => inner.rewrite(article).await,
            None => Err("generative rewrite is not configured".into()),
        }
    }
}

/// Rewrites articles through an `awful_aj` chat endpoint.
#[derive(Debug)]
pub struct LlmRewriter {
    config: AwfulJadeConfig,
    template: ChatTemplate,
}

impl LlmRewriter {
    pub fn new(config: AwfulJadeConfig, template: ChatTemplate) -> Self {
        Self { config, template }
    }

    /// Load the LLM config and chat template the way `awful_aj` lays them out.
    ///
    /// `config_path` overrides `<awful_aj config dir>/config.yaml`.
    #[instrument(level = "info", skip_all, fields(template = %template_name))]
    pub async fn load(config_path: Option<&str>, template_name: &str) -> Result<Self, Box<dyn Error>> {
        let config_path = match config_path {
            Some(p) => p.to_string(),
            None => awful_aj::config_dir()?
                .join("config.yaml")
                .to_str()
                .ok_or("config path is not valid UTF-8")?
                .to_string(),
        };
        let config = awful_aj::config::load_config(&config_path)?;
        let template = awful_aj::template::load_template(template_name).await?;
        info!(%config_path, "Loaded rewrite configuration");
        Ok(Self::new(config, template))
    }
}

impl Rewriter for LlmRewriter {
    #[instrument(level = "info", skip_all, fields(link = %article.link))]
    async fn rewrite(&self, article: &Article) -> Result<String, Box<dyn Error>> {
        let client = AskFnWrapper {
            config: &self.config,
            template: &self.template,
        };
        let api = RetryAsk::new(client, 5, StdDuration::from_secs(1));
        let response = api.ask(&build_prompt(article)).await?;
        clamp_post(&response).ok_or_else(|| "model returned an empty post".into())
    }
}

/// Instructions plus article content for the generative service.
pub fn build_prompt(article: &Article) -> String {
    let category = if article.category.is_empty() {
        "general"
    } else {
        article.category.as_str()
    };
    format!(
        "Rephrase the following news for a Twitter post. Make it engaging, informative and include 2-3 relevant hashtags.\n\
         - Use **bold** for important keywords\n\
         - Keep it under {MAX_POST_CHARS} characters\n\
         - Don't mention 'article' or 'news summary'\n\
         - Don't include links\n\
         - Category: {category}\n\n\
         Title: {}\n\
         Summary: {}\n\n\
         Twitter Post:",
        article.title, article.summary_excerpt
    )
}

/// Trim a model response and fit it into [`MAX_POST_CHARS`].
///
/// Returns `None` for a blank response.
pub fn clamp_post(response: &str) -> Option<String> {
    let text = response.trim();
    if text.is_empty() {
        return None;
    }
    if text.chars().count() > MAX_POST_CHARS {
        Some(format!("{}...", truncate_chars(text, MAX_POST_CHARS - 3)))
    } else {
        Some(text.to_string())
    }
}

/// Deterministic post used whenever the generative service cannot help.
///
/// `"{title} — {excerpt[..100]}... #Category #News"`, capped at
/// [`MAX_POST_CHARS`].
pub fn fallback_post(article: &Article) -> String {
    let hashtag = if article.category.is_empty() {
        String::new()
    } else {
        format!(" #{}", upcase(&article.category))
    };
    let post = format!(
        "{} — {}...{} #News",
        article.title,
        truncate_chars(&article.summary_excerpt, 100),
        hashtag
    );
    truncate_chars(&post, MAX_POST_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::cell::Cell;

    fn article(title: &str, excerpt: &str, category: &str) -> Article {
        Article {
            title: title.to_string(),
            summary_excerpt: excerpt.to_string(),
            raw_summary: excerpt.to_string(),
            link: "https://example.com/a".to_string(),
            published_date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            category: category.to_string(),
            score: 0.0,
        }
    }

    /// Fails a fixed number of times, then answers.
    #[derive(Debug)]
    struct Flaky {
        failures_left: Cell<usize>,
        calls: Cell<usize>,
    }

    impl Flaky {
        fn new(failures: usize) -> Self {
            Self {
                failures_left: Cell::new(failures),
                calls: Cell::new(0),
            }
        }
    }

    impl AskAsync for Flaky {
        type Response = String;

        async fn ask(&self, text: &str) -> Result<String, Box<dyn Error>> {
            self.calls.set(self.calls.get() + 1);
            if self.failures_left.get() > 0 {
                self.failures_left.set(self.failures_left.get() - 1);
                return Err("503 service unavailable".into());
            }
            Ok(format!("echo: {text}"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_after_transient_failures() {
        let api = RetryAsk::new(Flaky::new(2), 5, StdDuration::from_secs(1));
        let resp = api.ask("hello").await.unwrap();
        assert_eq!(resp, "echo: hello");
        assert_eq!(api.inner.calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_retries() {
        let api = RetryAsk::new(Flaky::new(10), 2, StdDuration::from_secs(1));
        assert!(api.ask("hello").await.is_err());
        assert_eq!(api.inner.calls.get(), 3);
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let api = RetryAsk::new(Flaky::new(0), 5, StdDuration::from_secs(1));
        assert_eq!(api.backoff(1), StdDuration::from_secs(1));
        assert_eq!(api.backoff(2), StdDuration::from_secs(2));
        assert_eq!(api.backoff(5), StdDuration::from_secs(16));
        assert_eq!(api.backoff(6), StdDuration::from_secs(30));
        assert_eq!(api.backoff(200), StdDuration::from_secs(30));
    }

    #[tokio::test]
    async fn test_unconfigured_rewriter_fails() {
        let rewriter: Option<LlmRewriter> = None;
        let a = article("Title", "Excerpt.", "india");
        assert!(rewriter.rewrite(&a).await.is_err());
    }

    #[test]
    fn test_fallback_post_format() {
        let a = article("Markets rally", "Sensex gains 500 points.", "business");
        assert_eq!(
            fallback_post(&a),
            "Markets rally — Sensex gains 500 points.... #Business #News"
        );
    }

    #[test]
    fn test_fallback_post_without_category() {
        let a = article("Markets rally", "Up.", "");
        assert_eq!(fallback_post(&a), "Markets rally — Up.... #News");
    }

    #[test]
    fn test_fallback_post_is_capped() {
        let long_title = "t".repeat(400);
        let a = article(&long_title, &"e".repeat(300), "world");
        let post = fallback_post(&a);
        assert_eq!(post.chars().count(), MAX_POST_CHARS);
        // excerpt contributes at most 100 chars
        let short = article("T", &"e".repeat(300), "world");
        assert_eq!(fallback_post(&short), format!("T — {}... #World #News", "e".repeat(100)));
    }

    #[test]
    fn test_clamp_post() {
        assert_eq!(clamp_post("  short post \n"), Some("short post".to_string()));
        assert_eq!(clamp_post("   "), None);

        let long = "x".repeat(300);
        let clamped = clamp_post(&long).unwrap();
        assert_eq!(clamped.chars().count(), MAX_POST_CHARS);
        assert!(clamped.ends_with("..."));
    }

    #[test]
    fn test_prompt_carries_article_and_category() {
        let a = article("Rains lash Mumbai", "Heavy rain. Trains delayed.", "india");
        let prompt = build_prompt(&a);
        assert!(prompt.contains("Title: Rains lash Mumbai"));
        assert!(prompt.contains("Summary: Heavy rain. Trains delayed."));
        assert!(prompt.contains("Category: india"));
        assert!(prompt.contains("under 280 characters"));

        let general = article("x", "y", "");
        assert!(build_prompt(&general).contains("Category: general"));
    }
}
