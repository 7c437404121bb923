use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tweet identifier from the input corpus.
///
/// Opaque to the pipeline, but always a non-empty run of ASCII digits so
/// that one bad value cannot poison an entire lookup request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TweetId(String);

impl TweetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TweetId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("empty tweet id".to_string());
        }
        if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("tweet id `{}` is not numeric", trimmed));
        }
        Ok(TweetId(trimmed.to_string()))
    }
}

impl TryFrom<String> for TweetId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TweetId> for String {
    fn from(id: TweetId) -> Self {
        id.0
    }
}

impl AsRef<str> for TweetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TweetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the result store. Written once, never updated.
///
/// Field order is the CSV column order: `tweet_id,text,created_at,author_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydratedRecord {
    pub tweet_id: TweetId,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    pub author_id: Option<String>,
}

impl HydratedRecord {
    /// Build a record from a looked-up tweet whose id is already known to be
    /// part of the batch.
    pub fn from_tweet(tweet_id: TweetId, tweet: twitter_client::Tweet) -> Self {
        Self {
            tweet_id,
            text: tweet.text,
            created_at: tweet.created_at,
            author_id: tweet.author_id,
        }
    }
}

/// CSV header of the result store.
pub const RESULT_HEADER: [&str; 4] = ["tweet_id", "text", "created_at", "author_id"];
