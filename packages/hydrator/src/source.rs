//! Identifier source: the input corpus minus what is already hydrated.
//!
//! The result store is the only resume signal. The progress log is never
//! consulted here.

use indexmap::IndexSet;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::HydrateConfig;
use crate::error::{HydrateError, Result};
use crate::types::{HydratedRecord, TweetId, RESULT_HEADER};

/// Name of the identifier column in the input corpus.
pub const ID_COLUMN: &str = "tweet_id";

/// Work derived from the input corpus and the existing result store.
#[derive(Debug, Clone, Default)]
pub struct Workload {
    /// Input ids not yet hydrated, in order of first appearance.
    pub remaining: Vec<TweetId>,
    /// Ids present in the result store.
    pub already_hydrated: HashSet<TweetId>,
    /// Rows of the result store as loaded, in file order.
    pub existing: Vec<HydratedRecord>,
    /// Distinct ids in the input corpus.
    pub total_unique: usize,
}

#[derive(Debug, Clone)]
pub struct IdentifierSource {
    input_path: PathBuf,
    result_path: PathBuf,
}

impl IdentifierSource {
    pub fn new(input_path: impl Into<PathBuf>, result_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            result_path: result_path.into(),
        }
    }

    pub fn from_config(config: &HydrateConfig) -> Self {
        Self::new(&config.input_path, &config.output_path)
    }

    /// Read the corpus and the result store and compute what is left to do.
    pub fn load(&self) -> Result<Workload> {
        info!("Reading tweet IDs...");
        let input = self.read_identifiers()?;
        info!("Found {} unique tweet IDs.", input.len());

        let existing = read_result_store(&self.result_path)?;
        let already_hydrated: HashSet<TweetId> =
            existing.iter().map(|r| r.tweet_id.clone()).collect();
        if self.result_path.exists() {
            info!("{} tweets already hydrated.", already_hydrated.len());
        }

        let remaining: Vec<TweetId> = input
            .iter()
            .filter(|id| !already_hydrated.contains(*id))
            .cloned()
            .collect();
        info!("{} tweet IDs remaining to process.", remaining.len());

        Ok(Workload {
            remaining,
            already_hydrated,
            existing,
            total_unique: input.len(),
        })
    }

    /// Unique ids from the tab-separated corpus, first appearance wins.
    pub fn read_identifiers(&self) -> Result<IndexSet<TweetId>> {
        let path = self.input_path.as_path();
        let file = File::open(path).map_err(|source| HydrateError::InputOpen {
            path: path.to_path_buf(),
            source,
        })?;

        // Tweet text in these corpora carries stray quotes, so no quoting.
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .quoting(false)
            .flexible(true)
            .has_headers(true)
            .from_reader(BufReader::new(file));

        let headers = reader
            .headers()
            .map_err(|e| malformed(path, &e, "unreadable header"))?
            .clone();
        let column = headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').trim() == ID_COLUMN)
            .ok_or_else(|| HydrateError::MissingColumn {
                path: path.to_path_buf(),
                column: ID_COLUMN.to_string(),
            })?;

        let mut ids = IndexSet::new();
        let mut rows = 0usize;
        for result in reader.records() {
            let record = result.map_err(|e| malformed(path, &e, "unreadable row"))?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let raw = record.get(column).ok_or_else(|| HydrateError::MalformedInput {
                path: path.to_path_buf(),
                line,
                reason: format!(
                    "row has {} fields but `{}` is column {}",
                    record.len(),
                    ID_COLUMN,
                    column + 1
                ),
            })?;
            let id: TweetId = raw.parse().map_err(|reason| HydrateError::MalformedInput {
                path: path.to_path_buf(),
                line,
                reason,
            })?;
            ids.insert(id);
            rows += 1;
        }

        debug!(rows, unique = ids.len(), "Read input corpus");
        Ok(ids)
    }
}

/// Load every row of the result store. A missing or empty file is an empty
/// store; anything unparseable is an error.
pub fn read_result_store(path: &Path) -> Result<Vec<HydratedRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let store_err = |reason: String| HydrateError::ResultStore {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::Reader::from_path(path).map_err(|e| store_err(e.to_string()))?;
    let headers = reader.headers().map_err(|e| store_err(e.to_string()))?.clone();
    if headers.is_empty() {
        return Ok(Vec::new());
    }
    if headers.iter().ne(RESULT_HEADER.iter().copied()) {
        return Err(store_err(format!(
            "expected header `{}`, found `{}`",
            RESULT_HEADER.join(","),
            headers.iter().collect::<Vec<_>>().join(",")
        )));
    }

    reader
        .deserialize::<HydratedRecord>()
        .map(|row| row.map_err(|e| store_err(e.to_string())))
        .collect()
}

fn malformed(path: &Path, err: &csv::Error, what: &str) -> HydrateError {
    HydrateError::MalformedInput {
        path: path.to_path_buf(),
        line: err.position().map(|p| p.line()).unwrap_or(0),
        reason: format!("{}: {}", what, err),
    }
}
