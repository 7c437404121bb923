//! Batch fetcher: one lookup request per batch, bounded cooldown retries on
//! rate limiting, and degradation of every other failure into "the whole
//! batch is unresolved".

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use twitter_client::{Tweet, TwitterClient, TwitterError};

use crate::config::HydrateConfig;
use crate::error::{HydrateError, Result};
use crate::types::{HydratedRecord, TweetId};

/// Bulk tweet lookup used by the fetcher.
///
/// Implemented by [`TwitterClient`] and by `testing::MockLookup`.
#[async_trait]
pub trait TweetLookup: Send + Sync {
    /// Look up `ids` in a single request. Unresolvable ids are simply absent
    /// from the returned tweets.
    async fn lookup(&self, ids: &[TweetId]) -> twitter_client::Result<Vec<Tweet>>;
}

#[async_trait]
impl TweetLookup for TwitterClient {
    async fn lookup(&self, ids: &[TweetId]) -> twitter_client::Result<Vec<Tweet>> {
        Ok(self.lookup_tweets(ids).await?.data)
    }
}

#[async_trait]
impl<L: TweetLookup + ?Sized> TweetLookup for Arc<L> {
    async fn lookup(&self, ids: &[TweetId]) -> twitter_client::Result<Vec<Tweet>> {
        (**self).lookup(ids).await
    }
}

/// Result of fetching one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// One record per resolved id, in batch order.
    pub resolved: Vec<HydratedRecord>,
    /// Batch ids without a record, in batch order.
    pub unresolved: Vec<TweetId>,
    /// Cooldowns waited before the request went through.
    pub rate_limit_waits: u32,
    /// Set when a non-rate-limit failure marked the whole batch unresolved.
    pub failure: Option<String>,
}

impl BatchOutcome {
    /// Match returned tweets against the batch.
    fn from_lookup(batch: &[TweetId], tweets: Vec<Tweet>, rate_limit_waits: u32) -> Self {
        let mut by_id: HashMap<String, Tweet> =
            tweets.into_iter().map(|t| (t.id.clone(), t)).collect();

        let mut resolved = Vec::with_capacity(by_id.len());
        let mut unresolved = Vec::new();
        for id in batch {
            match by_id.remove(id.as_str()) {
                Some(tweet) => resolved.push(HydratedRecord::from_tweet(id.clone(), tweet)),
                None => unresolved.push(id.clone()),
            }
        }

        if !by_id.is_empty() {
            debug!(count = by_id.len(), "Ignoring tweets that were not requested");
        }

        Self {
            resolved,
            unresolved,
            rate_limit_waits,
            failure: None,
        }
    }

    fn failed(batch: &[TweetId], rate_limit_waits: u32, error: &TwitterError) -> Self {
        Self {
            resolved: Vec::new(),
            unresolved: batch.to_vec(),
            rate_limit_waits,
            failure: Some(error.to_string()),
        }
    }
}

pub struct BatchFetcher<L: TweetLookup> {
    lookup: L,
    cooldown: Duration,
    max_rate_limit_retries: u32,
}

impl<L: TweetLookup> BatchFetcher<L> {
    pub fn new(lookup: L, cooldown: Duration, max_rate_limit_retries: u32) -> Self {
        Self {
            lookup,
            cooldown,
            max_rate_limit_retries,
        }
    }

    pub fn from_config(lookup: L, config: &HydrateConfig) -> Self {
        Self::new(lookup, config.rate_limit_cooldown, config.max_rate_limit_retries)
    }

    /// Fetch one batch.
    ///
    /// Only [`HydrateError::RateLimitExhausted`] is returned as an error; the
    /// batch has then been neither resolved nor classified missing.
    pub async fn fetch(&self, batch: &[TweetId]) -> Result<BatchOutcome> {
        let mut waits = 0u32;

        loop {
            match self.lookup.lookup(batch).await {
                Ok(tweets) => return Ok(BatchOutcome::from_lookup(batch, tweets, waits)),
                Err(e) if e.is_rate_limited() => {
                    if waits >= self.max_rate_limit_retries {
                        warn!(
                            attempts = waits + 1,
                            "Rate limit persists after {} cooldowns, giving up on batch", waits
                        );
                        return Err(HydrateError::RateLimitExhausted { attempts: waits + 1 });
                    }
                    warn!("{}", e);
                    info!(
                        "Rate limit hit. Sleeping for {} seconds...",
                        self.cooldown.as_secs()
                    );
                    tokio::time::sleep(self.cooldown).await;
                    waits += 1;
                }
                Err(e) => {
                    warn!(size = batch.len(), "Error in batch processing: {}", e);
                    return Ok(BatchOutcome::failed(batch, waits, &e));
                }
            }
        }
    }
}
