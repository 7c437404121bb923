//! Testing utilities including a mock tweet lookup.
//!
//! Useful for exercising the pipeline without making real API calls.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex, RwLock};
use tracing_subscriber::layer::SubscriberExt;
use twitter_client::{Tweet, TwitterError};

use crate::fetcher::TweetLookup;
use crate::logging::LogLineFormat;
use crate::types::TweetId;

/// In-memory log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a subscriber that formats like the log file and return
/// everything it logged.
pub fn capture_logs(f: impl FnOnce()) -> String {
    let buf = SharedBuf::default();
    let sink = buf.clone();
    let subscriber = tracing_subscriber::registry().with(
        tracing_subscriber::fmt::layer()
            .event_format(LogLineFormat)
            .with_ansi(false)
            .with_writer(move || sink.clone()),
    );

    tracing::subscriber::with_default(subscriber, f);

    let bytes = buf.0.lock().unwrap().clone();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// A mock lookup with configurable resolvable ids and failure modes.
///
/// Clones share state, so a test can keep a handle for assertions after
/// moving a clone into the pipeline.
#[derive(Clone, Default)]
pub struct MockLookup {
    /// Tweets the API "knows", by id
    tweets: Arc<RwLock<HashMap<String, Tweet>>>,

    /// Tweets returned on every call whether requested or not
    extra: Arc<RwLock<Vec<Tweet>>>,

    /// Calls still to be answered with a rate limit
    rate_limits_pending: Arc<RwLock<usize>>,

    /// Answer every call with a rate limit
    always_rate_limited: Arc<RwLock<bool>>,

    /// Ids whose presence in a batch triggers a rate limit
    rate_limited_ids: Arc<RwLock<HashSet<String>>>,

    /// Calls still to be answered with a network error
    failures_pending: Arc<RwLock<usize>>,

    /// Ids whose presence in a batch triggers an API error
    poison_ids: Arc<RwLock<HashSet<String>>>,

    /// Every batch received, in order
    calls: Arc<RwLock<Vec<Vec<TweetId>>>>,
}

impl MockLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic tweet for `id`.
    pub fn tweet(id: &str) -> Tweet {
        Tweet {
            id: id.to_string(),
            text: format!("tweet {}", id),
            created_at: Utc.with_ymd_and_hms(2020, 5, 15, 16, 3, 42).single(),
            author_id: Some("1000".to_string()),
        }
    }

    /// Make `ids` resolvable.
    pub fn with_tweets<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut store = self.tweets.write().unwrap();
        for id in ids {
            store.insert(id.as_ref().to_string(), Self::tweet(id.as_ref()));
        }
        drop(store);
        self
    }

    /// Add a specific resolvable tweet.
    pub fn with_tweet(self, tweet: Tweet) -> Self {
        self.tweets.write().unwrap().insert(tweet.id.clone(), tweet);
        self
    }

    /// Return a tweet for `id` on every call even when it was not requested.
    pub fn with_extra_tweet(self, id: &str) -> Self {
        self.extra.write().unwrap().push(Self::tweet(id));
        self
    }

    /// Answer the next `n` calls with a rate limit.
    pub fn rate_limit_next(self, n: usize) -> Self {
        *self.rate_limits_pending.write().unwrap() += n;
        self
    }

    /// Answer every call with a rate limit.
    pub fn always_rate_limited(self) -> Self {
        *self.always_rate_limited.write().unwrap() = true;
        self
    }

    /// Rate limit any batch containing `id`.
    pub fn rate_limit_batches_containing(self, id: impl Into<String>) -> Self {
        self.rate_limited_ids.write().unwrap().insert(id.into());
        self
    }

    /// Stop rate limiting (e.g. between two runs of the same test).
    pub fn clear_rate_limit(&self) {
        *self.always_rate_limited.write().unwrap() = false;
        *self.rate_limits_pending.write().unwrap() = 0;
        self.rate_limited_ids.write().unwrap().clear();
    }

    /// Answer the next `n` calls with a network error.
    pub fn fail_next(self, n: usize) -> Self {
        *self.failures_pending.write().unwrap() += n;
        self
    }

    /// Fail any batch containing `id` with an API error.
    pub fn fail_batches_containing(self, id: impl Into<String>) -> Self {
        self.poison_ids.write().unwrap().insert(id.into());
        self
    }

    /// Get all batches received.
    pub fn calls(&self) -> Vec<Vec<TweetId>> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl TweetLookup for MockLookup {
    async fn lookup(&self, ids: &[TweetId]) -> twitter_client::Result<Vec<Tweet>> {
        self.calls.write().unwrap().push(ids.to_vec());

        if *self.always_rate_limited.read().unwrap() {
            return Err(TwitterError::RateLimited { reset_at: None });
        }
        if ids
            .iter()
            .any(|id| self.rate_limited_ids.read().unwrap().contains(id.as_str()))
        {
            return Err(TwitterError::RateLimited { reset_at: None });
        }
        {
            let mut pending = self.rate_limits_pending.write().unwrap();
            if *pending > 0 {
                *pending -= 1;
                return Err(TwitterError::RateLimited { reset_at: None });
            }
        }
        {
            let mut pending = self.failures_pending.write().unwrap();
            if *pending > 0 {
                *pending -= 1;
                return Err(TwitterError::Network("mock connection reset".into()));
            }
        }

        let poison = self.poison_ids.read().unwrap();
        if ids.iter().any(|id| poison.contains(id.as_str())) {
            return Err(TwitterError::Api {
                status: 400,
                message: "mock invalid request".into(),
            });
        }
        drop(poison);

        let store = self.tweets.read().unwrap();
        let mut found: Vec<Tweet> = ids
            .iter()
            .filter_map(|id| store.get(id.as_str()).cloned())
            .collect();
        found.extend(self.extra.read().unwrap().iter().cloned());

        Ok(found)
    }
}
