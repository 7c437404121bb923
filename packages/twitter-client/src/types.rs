use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A single tweet from the `/2/tweets` lookup endpoint.
///
/// `created_at` and `author_id` are only present when requested through
/// `tweet.fields`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    pub author_id: Option<String>,
}

/// Per-resource problem reported alongside (or instead of) `data`.
///
/// Deleted, protected and malformed ids show up here rather than failing
/// the whole request.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceProblem {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type", default)]
    pub problem_type: Option<String>,
}

/// Body of a successful lookup. Both arrays are omitted by the API when empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TweetLookupResponse {
    #[serde(default)]
    pub data: Vec<Tweet>,
    #[serde(default)]
    pub errors: Vec<ResourceProblem>,
}
