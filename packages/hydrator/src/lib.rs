//! Resumable tweet hydration.
//!
//! Turns a tab-separated corpus of tweet ids into a CSV of full tweets,
//! one lookup request per batch, surviving rate limits and restarts.
//!
//! # Pipeline
//!
//! 1. [`IdentifierSource`] reads the corpus and subtracts ids already in the
//!    result store.
//! 2. [`HydrationOrchestrator`] walks the remaining ids batch by batch.
//! 3. [`BatchFetcher`] issues the lookup, waiting out rate limits.
//! 4. [`PersistenceLedger`] makes each batch durable before the next starts.
//!
//! # Example
//!
//! ```rust,ignore
//! use hydrator::{HydrateConfig, HydrationOrchestrator};
//! use twitter_client::TwitterClient;
//!
//! let config = HydrateConfig::from_env()?;
//! let client = TwitterClient::from_env()?;
//!
//! let summary = HydrationOrchestrator::new(config, client).run().await?;
//! println!("{} hydrated, {} missing", summary.hydrated, summary.missing);
//! ```

pub mod config;
pub mod error;
pub mod fetcher;
pub mod ledger;
pub mod logging;
pub mod orchestrator;
pub mod source;
pub mod testing;
pub mod types;

pub use config::{HydrateConfig, PersistMode};
pub use error::{HydrateError, Result};
pub use fetcher::{BatchFetcher, BatchOutcome, TweetLookup};
pub use ledger::PersistenceLedger;
pub use orchestrator::{
    partition_batches, status, HaltReason, HydrationOrchestrator, RunPhase, RunSummary,
    StatusReport,
};
pub use source::{read_result_store, IdentifierSource, Workload};
pub use types::{HydratedRecord, TweetId};
