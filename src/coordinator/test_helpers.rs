//! Shared test helpers for creating Coordinator instances in tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{TempDir, tempdir};

use super::{Coordinator, Transfer};
use crate::config::Config;
use crate::error::{DownloadError, Error, Result};
use crate::ledger::Ledger;
use crate::tagging::{NoOpTagger, Tagger};
use crate::types::Item;

/// Transfer that writes a small file after a delay and records what it did
#[derive(Default)]
pub(crate) struct MockTransfer {
    delay: Duration,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    current: AtomicUsize,
    max_seen: AtomicUsize,
    fetched: Mutex<Vec<String>>,
}

impl MockTransfer {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    /// Fail transfers of this URL with HTTP 500
    pub(crate) fn failing_on(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// Panic inside transfers of this URL
    pub(crate) fn panicking_on(mut self, url: &str) -> Self {
        self.panicking.insert(url.to_string());
        self
    }

    /// Highest number of transfers observed running at once
    pub(crate) fn max_concurrency(&self) -> usize {
        self.max_seen.load(Ordering::SeqCst)
    }

    /// URLs passed to `fetch`, in call order
    pub(crate) fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transfer for MockTransfer {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<()> {
        self.fetched.lock().unwrap().push(url.to_string());
        if self.panicking.contains(url) {
            panic!("transfer of {url} blew up");
        }

        let running = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.current.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(url) {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: 500,
            }
            .into());
        }
        tokio::fs::write(destination, b"ID3 test audio").await?;
        Ok(())
    }
}

/// Tagger recording the dates it was called for, optionally failing or panicking
#[derive(Default)]
pub(crate) struct RecordingTagger {
    pub(crate) fail: bool,
    pub(crate) panic: bool,
    pub(crate) tagged: Mutex<Vec<NaiveDate>>,
}

#[async_trait]
impl Tagger for RecordingTagger {
    async fn tag(&self, _path: &Path, item: &Item) -> Result<()> {
        self.tagged.lock().unwrap().push(item.date);
        if self.panic {
            panic!("tagger exploded on {}", item.date);
        }
        if self.fail {
            return Err(Error::Tagging("unsupported file".to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

pub(crate) fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

/// Item dated 2024-01-`day` with fallback URL `https://cdn.example/<day>.mp3`
pub(crate) fn item(day: u32) -> Item {
    Item::new(
        date(day),
        format!("Episode {day}"),
        format!("https://cdn.example/{day}.mp3"),
    )
}

/// Config writing into `<temp>/media` with the given worker count
pub(crate) fn test_config(temp_dir: &TempDir, workers: usize) -> Config {
    let mut config = Config::for_working_dir(temp_dir.path().join("media"));
    config.download.max_parallel_downloads = workers;
    config.ledger.path = Some(temp_dir.path().join("kfdl-state.txt"));
    config.ledger.save_interval = Duration::ZERO;
    config
}

/// Build a coordinator from a prepared config
pub(crate) fn create_coordinator_from(
    config: &Config,
    transfer: Arc<dyn Transfer>,
    tagger: Arc<dyn Tagger>,
) -> Coordinator {
    std::fs::create_dir_all(&config.download.working_dir).unwrap();
    let ledger = Ledger::new(config.ledger_path());
    Coordinator::new(config, ledger, transfer, tagger).unwrap()
}

/// Helper to create a test Coordinator with a no-op tagger.
/// Returns the coordinator and the tempdir (which must be kept alive).
pub(crate) fn create_test_coordinator(
    transfer: Arc<dyn Transfer>,
    workers: usize,
) -> (Coordinator, TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(&temp_dir, workers);
    let coordinator = create_coordinator_from(&config, transfer, Arc::new(NoOpTagger));
    (coordinator, temp_dir)
}

/// Wait for drainage, failing the test after five seconds
pub(crate) async fn drained(coordinator: &Coordinator) {
    tokio::time::timeout(Duration::from_secs(5), coordinator.wait_until_drained())
        .await
        .expect("coordinator did not drain");
}
