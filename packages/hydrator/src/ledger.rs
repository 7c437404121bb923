//! Durable writes: result store, progress log and missing list.
//!
//! Every write happens at a batch boundary, so an interrupted run loses at
//! most the batch in flight.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{HydrateConfig, PersistMode};
use crate::error::{HydrateError, Result};
use crate::types::{HydratedRecord, TweetId};

pub struct PersistenceLedger {
    result_path: PathBuf,
    progress_path: PathBuf,
    missing_path: PathBuf,
    mode: PersistMode,
    /// Full table for rewrite mode; unused in append mode.
    records: Vec<HydratedRecord>,
}

impl PersistenceLedger {
    /// Open the ledger on top of the rows already in the result store.
    pub fn open(config: &HydrateConfig, existing: Vec<HydratedRecord>) -> Self {
        let records = match config.persist_mode {
            PersistMode::Rewrite => existing,
            PersistMode::Append => Vec::new(),
        };

        Self {
            result_path: config.output_path.clone(),
            progress_path: config.progress_path.clone(),
            missing_path: config.missing_path.clone(),
            mode: config.persist_mode,
            records,
        }
    }

    /// Make `records` durable in the result store.
    pub fn append_records(&mut self, records: &[HydratedRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        match self.mode {
            PersistMode::Rewrite => {
                self.records.extend_from_slice(records);
                rewrite_table(&self.result_path, &self.records)?;
            }
            PersistMode::Append => append_rows(&self.result_path, records)?,
        }

        debug!(
            added = records.len(),
            path = %self.result_path.display(),
            "Persisted hydrated tweets"
        );
        Ok(())
    }

    /// Record that a fetch attempt concluded for each of `ids`.
    pub fn append_progress(&self, ids: &[TweetId]) -> Result<()> {
        ensure_parent(&self.progress_path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.progress_path)
            .map_err(|e| HydrateError::persist(&self.progress_path, e))?;

        write_lines(&self.progress_path, file, ids)
    }

    /// Replace the missing list with this run's unresolved ids.
    pub fn write_missing(&self, ids: &[TweetId]) -> Result<()> {
        ensure_parent(&self.missing_path)?;
        let file = File::create(&self.missing_path)
            .map_err(|e| HydrateError::persist(&self.missing_path, e))?;

        write_lines(&self.missing_path, file, ids)
    }

    pub fn result_path(&self) -> &Path {
        &self.result_path
    }

    pub fn missing_path(&self) -> &Path {
        &self.missing_path
    }
}

/// Write the whole table to a sibling temp file, then rename it into place.
fn rewrite_table(path: &Path, records: &[HydratedRecord]) -> Result<()> {
    ensure_parent(path)?;
    let tmp = temp_path(path);

    let mut writer = csv::Writer::from_path(&tmp).map_err(|e| HydrateError::persist_csv(&tmp, e))?;
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| HydrateError::persist_csv(&tmp, e))?;
    }
    let file = writer
        .into_inner()
        .map_err(|e| HydrateError::persist(&tmp, e.into_error()))?;
    file.sync_all().map_err(|e| HydrateError::persist(&tmp, e))?;
    drop(file);

    fs::rename(&tmp, path).map_err(|e| HydrateError::persist(path, e))
}

/// Append rows, writing the header only when the file is new or empty.
fn append_rows(path: &Path, records: &[HydratedRecord]) -> Result<()> {
    ensure_parent(path)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| HydrateError::persist(path, e))?;
    let is_empty = file
        .metadata()
        .map_err(|e| HydrateError::persist(path, e))?
        .len()
        == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(is_empty)
        .from_writer(file);
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| HydrateError::persist_csv(path, e))?;
    }
    writer.flush().map_err(|e| HydrateError::persist(path, e))
}

fn write_lines(path: &Path, file: File, ids: &[TweetId]) -> Result<()> {
    let mut out = BufWriter::new(file);
    for id in ids {
        writeln!(out, "{}", id).map_err(|e| HydrateError::persist(path, e))?;
    }
    out.flush().map_err(|e| HydrateError::persist(path, e))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "results".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| HydrateError::persist(parent, e))
        }
        _ => Ok(()),
    }
}
