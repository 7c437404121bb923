//! Pure X (Twitter) API v2 REST client.
//!
//! A minimal client for the tweet lookup endpoint. It knows nothing about
//! batching schedules, persistence or retries; callers decide what to do
//! with a [`TwitterError::RateLimited`].
//!
//! # Example
//!
//! ```rust,ignore
//! use twitter_client::TwitterClient;
//!
//! let client = TwitterClient::from_env()?;
//!
//! let resp = client.lookup_tweets(&["1261326399320715264", "20"]).await?;
//! for tweet in &resp.data {
//!     println!("{}: {}", tweet.id, tweet.text);
//! }
//! ```

pub mod error;
pub mod types;

pub use error::{Result, TwitterError};
pub use types::{ResourceProblem, Tweet, TweetLookupResponse};

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

const BASE_URL: &str = "https://api.twitter.com/2";

/// Maximum number of ids accepted by a single `/2/tweets` lookup.
pub const MAX_LOOKUP_IDS: usize = 100;

/// Fields requested in addition to the default `id` and `text`.
const TWEET_FIELDS: &str = "created_at,author_id";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const RATE_LIMIT_RESET_HEADER: &str = "x-rate-limit-reset";

/// X API v2 client authenticated with an app-only bearer token.
#[derive(Clone)]
pub struct TwitterClient {
    http_client: Client,
    bearer_token: String,
    base_url: String,
}

impl TwitterClient {
    /// Create a new client with the given bearer token.
    pub fn new(bearer_token: impl Into<String>) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| TwitterError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            bearer_token: bearer_token.into(),
            base_url: BASE_URL.to_string(),
        })
    }

    /// Create from environment variable `TWITTER_BEARER_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("TWITTER_BEARER_TOKEN")
            .map_err(|_| TwitterError::Config("TWITTER_BEARER_TOKEN not set".into()))?;
        if token.trim().is_empty() {
            return Err(TwitterError::Config("TWITTER_BEARER_TOKEN is empty".into()));
        }
        Self::new(token)
    }

    /// Set a custom base URL (proxies, test servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Replace the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TwitterError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(self)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Look up up to [`MAX_LOOKUP_IDS`] tweets in one request.
    ///
    /// Ids the API cannot resolve (deleted, protected, malformed) are simply
    /// absent from `data`; that is not an error.
    pub async fn lookup_tweets<S: AsRef<str>>(&self, ids: &[S]) -> Result<TweetLookupResponse> {
        if ids.is_empty() {
            return Ok(TweetLookupResponse::default());
        }
        if ids.len() > MAX_LOOKUP_IDS {
            return Err(TwitterError::Config(format!(
                "Tweet lookup accepts at most {} ids, got {}",
                MAX_LOOKUP_IDS,
                ids.len()
            )));
        }

        let joined = ids.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(",");
        let start = std::time::Instant::now();

        let response = self
            .http_client
            .get(format!("{}/tweets", self.base_url))
            .bearer_auth(&self.bearer_token)
            .query(&[("ids", joined.as_str()), ("tweet.fields", TWEET_FIELDS)])
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Tweet lookup request failed");
                TwitterError::Network(e.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let reset_at = parse_rate_limit_reset(response.headers());
            warn!(reset_at = ?reset_at, "Tweet lookup rate limited");
            return Err(TwitterError::RateLimited { reset_at });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %body, "Tweet lookup API error");
            return Err(TwitterError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let lookup: TweetLookupResponse = response
            .json()
            .await
            .map_err(|e| TwitterError::Parse(e.to_string()))?;

        debug!(
            requested = ids.len(),
            returned = lookup.data.len(),
            problems = lookup.errors.len(),
            duration_ms = start.elapsed().as_millis(),
            "Tweet lookup"
        );

        Ok(lookup)
    }
}

/// Parse the epoch-seconds `x-rate-limit-reset` header.
fn parse_rate_limit_reset(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let raw = headers.get(RATE_LIMIT_RESET_HEADER)?.to_str().ok()?;
    let secs: i64 = raw.trim().parse().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}
