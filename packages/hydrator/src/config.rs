use dotenvy::dotenv;
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use twitter_client::MAX_LOOKUP_IDS;

use crate::error::{HydrateError, Result};

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_BATCH_DELAY_SECS: u64 = 1;
pub const DEFAULT_RATE_LIMIT_COOLDOWN_SECS: u64 = 900;
pub const DEFAULT_MAX_RATE_LIMIT_RETRIES: u32 = 4;

/// How the result store is written after each batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PersistMode {
    /// Rewrite the whole accumulated table (temp file + rename)
    #[default]
    Rewrite,
    /// Append only the new rows
    Append,
}

impl FromStr for PersistMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rewrite" => Ok(PersistMode::Rewrite),
            "append" => Ok(PersistMode::Append),
            other => Err(format!("unknown persist mode `{}` (expected rewrite or append)", other)),
        }
    }
}

/// Hydration settings, built once at startup and handed to each component.
#[derive(Debug, Clone)]
pub struct HydrateConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub progress_path: PathBuf,
    pub missing_path: PathBuf,
    pub log_path: PathBuf,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub rate_limit_cooldown: Duration,
    /// Cooldowns allowed per batch before giving up on it.
    pub max_rate_limit_retries: u32,
    pub persist_mode: PersistMode,
    /// Override for the X API base URL.
    pub api_base_url: Option<String>,
}

impl Default for HydrateConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("train.txt"),
            output_path: PathBuf::from("hydrated_tweets.csv"),
            progress_path: PathBuf::from("completed_batches.txt"),
            missing_path: PathBuf::from("missing_tweets.txt"),
            log_path: PathBuf::from("hydration_log.txt"),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: Duration::from_secs(DEFAULT_BATCH_DELAY_SECS),
            rate_limit_cooldown: Duration::from_secs(DEFAULT_RATE_LIMIT_COOLDOWN_SECS),
            max_rate_limit_retries: DEFAULT_MAX_RATE_LIMIT_RETRIES,
            persist_mode: PersistMode::Rewrite,
            api_base_url: None,
        }
    }
}

impl HydrateConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Unset variables keep defaults.
    ///
    /// Values are parsed but not range-checked; call [`validate`](Self::validate)
    /// once command-line overrides have been applied.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let path = |key: &str, default: PathBuf| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default)
        };

        Ok(Self {
            input_path: path("HYDRATE_INPUT_PATH", defaults.input_path),
            output_path: path("HYDRATE_OUTPUT_PATH", defaults.output_path),
            progress_path: path("HYDRATE_PROGRESS_PATH", defaults.progress_path),
            missing_path: path("HYDRATE_MISSING_PATH", defaults.missing_path),
            log_path: path("HYDRATE_LOG_PATH", defaults.log_path),
            batch_size: parse_var(&lookup, "HYDRATE_BATCH_SIZE", defaults.batch_size)?,
            batch_delay: Duration::from_secs(parse_var(
                &lookup,
                "HYDRATE_BATCH_DELAY_SECS",
                DEFAULT_BATCH_DELAY_SECS,
            )?),
            rate_limit_cooldown: Duration::from_secs(parse_var(
                &lookup,
                "HYDRATE_RATE_LIMIT_COOLDOWN_SECS",
                DEFAULT_RATE_LIMIT_COOLDOWN_SECS,
            )?),
            max_rate_limit_retries: parse_var(
                &lookup,
                "HYDRATE_MAX_RATE_LIMIT_RETRIES",
                defaults.max_rate_limit_retries,
            )?,
            persist_mode: parse_var(&lookup, "HYDRATE_PERSIST_MODE", defaults.persist_mode)?,
            api_base_url: lookup("TWITTER_API_BASE_URL").filter(|v| !v.trim().is_empty()),
        })
    }

    /// Reject settings the lookup endpoint cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.batch_size > MAX_LOOKUP_IDS {
            return Err(HydrateError::Config(format!(
                "batch size must be between 1 and {}, got {}",
                MAX_LOOKUP_IDS, self.batch_size
            )));
        }
        Ok(())
    }

    pub fn with_input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_path = path.into();
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn with_progress_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.progress_path = path.into();
        self
    }

    pub fn with_missing_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.missing_path = path.into();
        self
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn with_rate_limit_cooldown(mut self, cooldown: Duration) -> Self {
        self.rate_limit_cooldown = cooldown;
        self
    }

    pub fn with_max_rate_limit_retries(mut self, retries: u32) -> Self {
        self.max_rate_limit_retries = retries;
        self
    }

    pub fn with_persist_mode(mut self, mode: PersistMode) -> Self {
        self.persist_mode = mode;
        self
    }

    /// Place every file under `dir`, keeping the default file names.
    pub fn rooted_at(self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let defaults = Self::default();
        self.with_input_path(dir.join(defaults.input_path))
            .with_output_path(dir.join(defaults.output_path))
            .with_progress_path(dir.join(defaults.progress_path))
            .with_missing_path(dir.join(defaults.missing_path))
            .with_log_path(dir.join(defaults.log_path))
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| HydrateError::Config(format!("{} must be valid: {}", key, e))),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = HydrateConfig::from_vars(vars(&[])).unwrap();

        assert_eq!(config.batch_size, 100);
        assert_eq!(config.batch_delay, Duration::from_secs(1));
        assert_eq!(config.rate_limit_cooldown, Duration::from_secs(900));
        assert_eq!(config.max_rate_limit_retries, 4);
        assert_eq!(config.persist_mode, PersistMode::Rewrite);
        assert_eq!(config.output_path, PathBuf::from("hydrated_tweets.csv"));
        assert_eq!(config.progress_path, PathBuf::from("completed_batches.txt"));
        assert_eq!(config.missing_path, PathBuf::from("missing_tweets.txt"));
        assert_eq!(config.log_path, PathBuf::from("hydration_log.txt"));
        assert!(config.api_base_url.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = HydrateConfig::from_vars(vars(&[
            ("HYDRATE_INPUT_PATH", "data/dev.tsv"),
            ("HYDRATE_BATCH_SIZE", "25"),
            ("HYDRATE_BATCH_DELAY_SECS", "0"),
            ("HYDRATE_RATE_LIMIT_COOLDOWN_SECS", "60"),
            ("HYDRATE_MAX_RATE_LIMIT_RETRIES", "1"),
            ("HYDRATE_PERSIST_MODE", "Append"),
            ("TWITTER_API_BASE_URL", "http://localhost:9000/2"),
        ]))
        .unwrap();

        assert_eq!(config.input_path, PathBuf::from("data/dev.tsv"));
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.batch_delay, Duration::ZERO);
        assert_eq!(config.rate_limit_cooldown, Duration::from_secs(60));
        assert_eq!(config.max_rate_limit_retries, 1);
        assert_eq!(config.persist_mode, PersistMode::Append);
        assert_eq!(config.api_base_url.as_deref(), Some("http://localhost:9000/2"));
    }

    #[test]
    fn test_blank_values_keep_defaults() {
        let config = HydrateConfig::from_vars(vars(&[
            ("HYDRATE_BATCH_SIZE", "  "),
            ("HYDRATE_OUTPUT_PATH", ""),
        ]))
        .unwrap();

        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.output_path, PathBuf::from("hydrated_tweets.csv"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = HydrateConfig::from_vars(vars(&[("HYDRATE_BATCH_SIZE", "lots")])).unwrap_err();
        assert!(matches!(err, HydrateError::Config(msg) if msg.contains("HYDRATE_BATCH_SIZE")));

        let err = HydrateConfig::from_vars(vars(&[("HYDRATE_PERSIST_MODE", "sqlite")])).unwrap_err();
        assert!(matches!(err, HydrateError::Config(_)));
    }

    #[test]
    fn test_batch_size_bounds() {
        let check = |size: &str| {
            HydrateConfig::from_vars(vars(&[("HYDRATE_BATCH_SIZE", size)]))
                .unwrap()
                .validate()
        };
        assert!(check("0").is_err());
        assert!(check("101").is_err());
        assert!(check("100").is_ok());
        assert!(HydrateConfig::default().with_batch_size(1).validate().is_ok());
    }

    #[test]
    fn test_out_of_range_env_value_can_be_overridden() {
        let config = HydrateConfig::from_vars(vars(&[("HYDRATE_BATCH_SIZE", "500")])).unwrap();
        assert_eq!(config.batch_size, 500);

        let config = config.with_batch_size(50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rooted_at() {
        let config = HydrateConfig::default().rooted_at("/tmp/run1");
        assert_eq!(config.input_path, PathBuf::from("/tmp/run1/train.txt"));
        assert_eq!(config.missing_path, PathBuf::from("/tmp/run1/missing_tweets.txt"));
    }
}
