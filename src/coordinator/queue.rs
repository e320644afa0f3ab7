//! Accepting items into the pending queue.

use std::sync::atomic::Ordering;

use crate::error::{Error, Result};
use crate::types::{DownloadState, Event, Item};

use super::Coordinator;

impl Coordinator {
    /// Queue an item for download
    ///
    /// Records `Queued` in the ledger before the item becomes visible to the queue
    /// processor, so a worker can never write `Downloading` first. An item whose
    /// date is already pending or active is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`] once [`Coordinator::shutdown`] has begun.
    pub async fn queue(&self, item: Item) -> Result<()> {
        if !self.queue_state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let date = item.date;
        let title = item.title.clone();
        {
            let mut pending = self.queue_state.pending.lock().await;
            // Shutdown clears the queue under this lock
            if !self.queue_state.accepting_new.load(Ordering::SeqCst) {
                return Err(Error::ShuttingDown);
            }
            let duplicate = pending.iter().any(|queued| queued.date == date)
                || self.queue_state.active_downloads.lock().await.contains(&date);
            if duplicate {
                tracing::warn!(date = %date, "Item already queued or downloading, ignoring");
                return Ok(());
            }

            self.ledger.record(&item, DownloadState::Queued).await;
            pending.push_back(item);

            let mut finish = self.finish_state.lock().await;
            finish.has_work = true;
            finish.finished = false;
        }

        tracing::info!(date = %date, title = %title, "Item queued");
        self.queue_state.work_available.notify_one();
        self.emit_event(Event::Queued { date, title });
        Ok(())
    }

    /// Number of items waiting for a worker
    pub async fn pending_count(&self) -> usize {
        self.queue_state.pending.lock().await.len()
    }

    /// Number of items currently being executed
    pub async fn active_count(&self) -> usize {
        self.queue_state.active_downloads.lock().await.len()
    }
}
