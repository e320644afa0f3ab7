//! Durable per-item download state.
//!
//! The [`Ledger`] is the source of truth for "what has been attempted and with
//! what outcome". It lives in memory, is shared by every worker through cheap
//! clones of the handle, and is written to a single text file (see [`format`])
//! either debounced ([`Ledger::save_if_due`]) or on demand ([`Ledger::force_save`]).
//!
//! All mutation and file I/O go through one mutex owned by the handle, so callers
//! never lock anything themselves. A save writes a sibling `.tmp` file and renames
//! it over the ledger, so the file on disk is always a complete snapshot.

mod format;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, LedgerError, Result};
use crate::types::{DownloadState, Item};

/// One ledger record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Item date (the key)
    pub date: NaiveDate,
    /// URL the item was, or will be, downloaded from
    pub download_link: String,
    /// Last recorded lifecycle state
    pub state: DownloadState,
}

struct LedgerState {
    entries: BTreeMap<NaiveDate, LedgerEntry>,
    dirty: bool,
    last_save: Option<Instant>,
}

/// Handle to the ledger of one run (cloneable, clones share state)
#[derive(Clone)]
pub struct Ledger {
    path: Arc<PathBuf>,
    state: Arc<tokio::sync::Mutex<LedgerState>>,
}

impl Ledger {
    /// Create an empty ledger backed by `path` without touching the file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_entries(path.into(), BTreeMap::new())
    }

    fn with_entries(path: PathBuf, entries: BTreeMap<NaiveDate, LedgerEntry>) -> Self {
        Self {
            path: Arc::new(path),
            state: Arc::new(tokio::sync::Mutex::new(LedgerState {
                entries,
                dirty: false,
                last_save: None,
            })),
        }
    }

    /// Load the ledger stored at `path`
    ///
    /// Never fails: a missing, unreadable or foreign file yields an empty ledger
    /// so the run can proceed with every item treated as unseen. Malformed
    /// records are dropped one by one with a warning.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No ledger file yet, starting fresh");
                return Self::new(path);
            }
            Err(e) => {
                tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read ledger file, starting with an empty ledger"
                );
                return Self::new(path);
            }
        };

        let parsed = match format::parse(&content) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Ledger header is invalid, ignoring ledger file"
                );
                return Self::new(path);
            }
        };

        for problem in &parsed.problems {
            tracing::warn!(
                path = %path.display(),
                error = %problem,
                "Ignoring malformed ledger line"
            );
        }

        let mut entries = BTreeMap::new();
        for entry in parsed.entries {
            if entries.contains_key(&entry.date) {
                tracing::warn!(
                    path = %path.display(),
                    date = %entry.date,
                    "Duplicate ledger entry, keeping the first one"
                );
                continue;
            }
            entries.insert(entry.date, entry);
        }

        tracing::info!(
            path = %path.display(),
            entries = entries.len(),
            skipped = parsed.problems.len(),
            "Ledger loaded"
        );

        Self::with_entries(path, entries)
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace the entry for `date`
    ///
    /// Returns `true` if the ledger changed. Writing an identical entry is a no-op
    /// and does not mark the ledger dirty.
    pub async fn upsert(
        &self,
        date: NaiveDate,
        download_link: impl Into<String>,
        state: DownloadState,
    ) -> bool {
        let entry = LedgerEntry {
            date,
            download_link: download_link.into(),
            state,
        };

        let mut guard = self.state.lock().await;
        if guard.entries.get(&date) == Some(&entry) {
            return false;
        }
        guard.entries.insert(date, entry);
        guard.dirty = true;
        true
    }

    /// Record `state` for an item under its effective URL
    pub async fn record(&self, item: &Item, state: DownloadState) -> bool {
        self.upsert(item.date, item.effective_url(), state).await
    }

    /// Entry for `date`, if any
    pub async fn get(&self, date: NaiveDate) -> Option<LedgerEntry> {
        self.state.lock().await.entries.get(&date).cloned()
    }

    /// Recorded state for `date`, if any
    pub async fn state_of(&self, date: NaiveDate) -> Option<DownloadState> {
        self.state.lock().await.entries.get(&date).map(|e| e.state)
    }

    /// Snapshot of all entries, newest date first
    pub async fn entries(&self) -> Vec<LedgerEntry> {
        self.state.lock().await.entries.values().rev().cloned().collect()
    }

    /// Number of entries
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Whether the ledger has no entries
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    /// Whether there are changes not yet written to disk
    pub async fn is_dirty(&self) -> bool {
        self.state.lock().await.dirty
    }

    /// Save when there are unsaved changes or `min_interval` passed since the
    /// last save
    ///
    /// Returns whether the file was written. A clean ledger is never rewritten, so
    /// in practice every change reaches the disk at the next call.
    pub async fn save_if_due(&self, min_interval: Duration) -> Result<bool> {
        let mut guard = self.state.lock().await;
        let interval_elapsed = guard
            .last_save
            .is_none_or(|last| last.elapsed() >= min_interval);
        if !guard.dirty && !interval_elapsed {
            return Ok(false);
        }
        self.save_locked(&mut guard).await
    }

    /// Save now if there are unsaved changes
    ///
    /// Returns whether the file was written. On failure the ledger stays dirty so
    /// a later save retries.
    pub async fn force_save(&self) -> Result<bool> {
        let mut guard = self.state.lock().await;
        self.save_locked(&mut guard).await
    }

    async fn save_locked(&self, state: &mut LedgerState) -> Result<bool> {
        if !state.dirty {
            return Ok(false);
        }
        self.write_locked(state).await?;
        Ok(true)
    }

    async fn write_locked(&self, state: &mut LedgerState) -> Result<()> {
        let content = format::render(state.entries.values().rev());

        if let Err(source) = write_atomically(&self.path, content.as_bytes()).await {
            tracing::error!(
                path = %self.path.display(),
                error = %source,
                "Failed to write ledger file"
            );
            return Err(Error::Ledger(LedgerError::Io {
                path: self.path.to_path_buf(),
                source,
            }));
        }

        state.dirty = false;
        state.last_save = Some(Instant::now());
        tracing::debug!(
            path = %self.path.display(),
            entries = state.entries.len(),
            "Ledger saved"
        );
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

async fn write_atomically(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = temp_path(path);
    tokio::fs::write(&tmp, content).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        tokio::fs::remove_file(&tmp).await.ok();
        return Err(e);
    }
    Ok(())
}
