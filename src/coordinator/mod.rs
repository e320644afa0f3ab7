//! Bounded-concurrency download coordinator split into focused submodules.
//!
//! The [`Coordinator`] and its methods are organized by concern:
//! - [`queue`] - Accepting items into the FIFO pending queue
//! - [`queue_processor`] - Dispatch loop bounded by a semaphore
//! - [`worker`] - Execution of one item (transfer, tagging, ledger transitions)
//! - [`transfer`] - The transfer seam and its HTTP implementation
//! - [`lifecycle`] - Drain notification, events and shutdown
//!
//! Every item moves through `Queued → Downloading → {Successful | Failed}` and the
//! [`Ledger`] is updated at each step.

mod lifecycle;
mod queue;
mod queue_processor;
mod transfer;
mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use transfer::{HttpTransfer, Transfer};

use chrono::NaiveDate;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::tagging::Tagger;
use crate::types::{Event, Item};

/// Queue and download state management
#[derive(Clone)]
pub(crate) struct QueueState {
    /// FIFO of items waiting for a worker
    pub(crate) pending: Arc<tokio::sync::Mutex<VecDeque<Item>>>,
    /// Semaphore to limit concurrent downloads (one permit per worker)
    pub(crate) concurrent_limit: Arc<tokio::sync::Semaphore>,
    /// Dates of the items currently being executed
    pub(crate) active_downloads: Arc<tokio::sync::Mutex<HashSet<NaiveDate>>>,
    /// Flag to indicate whether new items are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Wakes the queue processor when work was added or a worker finished
    pub(crate) work_available: Arc<tokio::sync::Notify>,
}

type FinishListener = Box<dyn FnOnce() + Send>;

/// Drain bookkeeping
#[derive(Default)]
pub(crate) struct FinishState {
    /// Something was queued since the coordinator was created
    pub(crate) has_work: bool,
    /// The queue drained and nothing was queued since
    pub(crate) finished: bool,
    /// Callbacks waiting for the next drain
    pub(crate) listeners: Vec<FinishListener>,
}

/// Static settings of a coordinator
#[derive(Clone, Debug)]
pub(crate) struct Settings {
    pub(crate) working_dir: PathBuf,
    pub(crate) transfer_timeout: Duration,
    pub(crate) save_interval: Duration,
}

/// Download coordinator (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Coordinator {
    /// Ledger receiving every state transition
    pub(crate) ledger: Ledger,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    pub(crate) settings: Arc<Settings>,
    /// Performs the actual transfers
    pub(crate) transfer: Arc<dyn Transfer>,
    /// Writes tags into finished files
    pub(crate) tagger: Arc<dyn Tagger>,
    pub(crate) queue_state: QueueState,
    pub(crate) finish_state: Arc<tokio::sync::Mutex<FinishState>>,
    /// Stops the queue processor
    pub(crate) processor_cancel: tokio_util::sync::CancellationToken,
}

impl Coordinator {
    /// Create a coordinator and start its queue processor
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        config: &Config,
        ledger: Ledger,
        transfer: Arc<dyn Transfer>,
        tagger: Arc<dyn Tagger>,
    ) -> Result<Self> {
        let workers = config.download.max_parallel_downloads;
        if workers == 0 {
            return Err(Error::config("max_parallel_downloads", "must be at least 1"));
        }

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        let queue_state = QueueState {
            pending: Arc::new(tokio::sync::Mutex::new(VecDeque::new())),
            concurrent_limit: Arc::new(tokio::sync::Semaphore::new(workers)),
            active_downloads: Arc::new(tokio::sync::Mutex::new(HashSet::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
            work_available: Arc::new(tokio::sync::Notify::new()),
        };

        let coordinator = Self {
            ledger,
            event_tx,
            settings: Arc::new(Settings {
                working_dir: config.download.working_dir.clone(),
                transfer_timeout: config.download.transfer_timeout,
                save_interval: config.ledger.save_interval,
            }),
            transfer,
            tagger,
            queue_state,
            finish_state: Arc::new(tokio::sync::Mutex::new(FinishState::default())),
            processor_cancel: tokio_util::sync::CancellationToken::new(),
        };

        coordinator.start_queue_processor();
        tracing::debug!(
            workers,
            working_dir = %config.download.working_dir.display(),
            tagger = coordinator.tagger.name(),
            "Coordinator started"
        );

        Ok(coordinator)
    }

    /// The ledger this coordinator writes to
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Local path an item is downloaded to
    pub fn destination(&self, item: &Item) -> PathBuf {
        self.settings.working_dir.join(item.file_name())
    }

    /// Emit an event to all subscribers
    ///
    /// Sending fails only when nobody is subscribed, which is fine.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
