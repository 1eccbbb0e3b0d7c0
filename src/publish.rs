//! Publishing posts.
//!
//! [`Publisher`] is the seam between the ranking pipeline and the outside
//! world. Two implementations ship:
//!
//! | Method | Type | Behaviour |
//! |--------|------|-----------|
//! | `api` | [`ApiPublisher`] | `POST /2/tweets` with a bearer token |
//! | `dry_run` | [`DryRunPublisher`] | Logs the post, reports success |
//!
//! Browser automation (`selenium` in older configs) is not supported and
//! runs as a dry run. A dry run touches neither the ledger nor the post log.
//!
//! `Ok(false)` means the service answered but did not accept the post; `Err`
//! means the attempt itself broke (no token, network failure).

use crate::config::PublishMethod;
use crate::utils::truncate_for_log;
use reqwest::Client;
use serde_json::json;
use std::error::Error;
use std::time::Duration as StdDuration;
use tracing::{info, instrument, warn};

pub const DEFAULT_API_ENDPOINT: &str = "https://api.twitter.com/2/tweets";

/// Sends post text somewhere.
pub trait Publisher {
    async fn publish(&self, text: &str) -> Result<bool, Box<dyn Error>>;

    /// `true` when nothing actually leaves the process. Dry runs must not
    /// consume ledger links or count as posts.
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Posts through the HTTP posting API.
#[derive(Debug, Clone)]
pub struct ApiPublisher {
    http: Client,
    endpoint: String,
    token: Option<String>,
}

impl ApiPublisher {
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self, Box<dyn Error>> {
        let http = Client::builder()
            .timeout(StdDuration::from_secs(30))
            .user_agent(concat!("headline_bot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }
}

impl Publisher for ApiPublisher {
    #[instrument(level = "info", skip_all, fields(endpoint = %self.endpoint))]
    async fn publish(&self, text: &str) -> Result<bool, Box<dyn Error>> {
        let token = self
            .token
            .as_deref()
            .ok_or("posting API token is not set (TWITTER_BEARER_TOKEN)")?;

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&json!({ "text": text }))
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            info!(%status, "Post accepted");
            Ok(true)
        } else {
            let body = resp.text().await.unwrap_or_default();
            warn!(%status, body = %truncate_for_log(&body, 300), "Post rejected");
            Ok(false)
        }
    }
}

/// Logs posts instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunPublisher;

impl Publisher for DryRunPublisher {
    async fn publish(&self, text: &str) -> Result<bool, Box<dyn Error>> {
        info!(post = %text, "Dry run: not publishing");
        Ok(true)
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

/// The publisher picked by configuration.
#[derive(Debug, Clone)]
pub enum AnyPublisher {
    Api(ApiPublisher),
    DryRun(DryRunPublisher),
}

impl AnyPublisher {
    /// Build the publisher for `method`. `dry_run` overrides the method.
    pub fn from_method(
        method: PublishMethod,
        dry_run: bool,
        token: Option<String>,
    ) -> Result<Self, Box<dyn Error>> {
        if dry_run {
            return Ok(Self::DryRun(DryRunPublisher));
        }
        match method {
            PublishMethod::Api => Ok(Self::Api(ApiPublisher::new(DEFAULT_API_ENDPOINT, token)?)),
            PublishMethod::DryRun => Ok(Self::DryRun(DryRunPublisher)),
            PublishMethod::Selenium => {
                warn!("Browser automation is not supported; running as a dry run");
                Ok(Self::DryRun(DryRunPublisher))
            }
        }
    }
}

impl Publisher for AnyPublisher {
    async fn publish(&self, text: &str) -> Result<bool, Box<dyn Error>> {
        match self {
            Self::Api(p) => p.publish(text).await,
            Self::DryRun(p) => p.publish(text).await,
        }
    }

    fn is_dry_run(&self) -> bool {
        match self {
            Self::Api(p) => p.is_dry_run(),
            Self::DryRun(p) => p.is_dry_run(),
        }
    }
}
