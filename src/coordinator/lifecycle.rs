//! Drain notification, event subscription and shutdown.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::types::Event;

use super::Coordinator;

/// How long shutdown waits for active downloads
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl Coordinator {
    /// Subscribe to coordinator events
    ///
    /// Each subscriber receives every event sent after it subscribed. A slow
    /// subscriber that falls more than 1000 events behind sees `Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Register a callback for when the pending queue is empty and no download is
    /// active
    ///
    /// If the queue already drained (and nothing was queued since), the callback
    /// runs immediately. Otherwise it runs exactly once, on the next drain.
    pub async fn on_finish<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut finish = self.finish_state.lock().await;
            if !finish.finished {
                finish.listeners.push(Box::new(callback));
                return;
            }
        }
        callback();
    }

    /// Wait until the pending queue is empty and no download is active
    ///
    /// Returns immediately if that is already the case after queued work.
    pub async fn wait_until_drained(&self) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.on_finish(move || {
            tx.send(()).ok();
        })
        .await;
        rx.await.ok();
    }

    /// Whether the queue has drained since work was last queued
    pub async fn is_finished(&self) -> bool {
        self.finish_state.lock().await.finished
    }

    /// Gracefully shut down the coordinator
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new items
    /// 2. Drops pending items (they stay `Queued` in the ledger and are picked up
    ///    again on the next run)
    /// 3. Waits for active downloads to complete with a timeout (30 seconds)
    /// 4. Stops the queue processor and releases pending [`Coordinator::on_finish`]
    ///    callbacks
    /// 5. Forces a final ledger save
    /// 6. Emits [`Event::Shutdown`]
    pub async fn shutdown(&self) {
        tracing::info!("Initiating graceful shutdown");

        self.queue_state.accepting_new.store(false, Ordering::SeqCst);

        let dropped = {
            let mut pending = self.queue_state.pending.lock().await;
            let dropped = pending.len();
            pending.clear();
            dropped
        };
        if dropped > 0 {
            tracing::info!(dropped, "Dropped pending items, they will be retried on the next run");
        }
        // Let the processor notice the empty queue
        self.queue_state.work_available.notify_one();

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_downloads()).await {
            Ok(()) => tracing::info!("All active downloads completed"),
            Err(_) => tracing::warn!(
                active = self.active_count().await,
                "Timeout waiting for downloads to complete, proceeding with shutdown"
            ),
        }

        self.processor_cancel.cancel();

        // Nothing will drain after this point; release anyone still waiting
        let listeners = {
            let mut finish = self.finish_state.lock().await;
            finish.finished = true;
            std::mem::take(&mut finish.listeners)
        };
        for listener in listeners {
            listener();
        }

        match self.ledger.force_save().await {
            Ok(_) => tracing::info!(
                path = %self.ledger.path().display(),
                "Final ledger state saved"
            ),
            Err(e) => tracing::error!(
                error = %e,
                kind = e.kind(),
                "Failed to save ledger during shutdown"
            ),
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
    }

    /// Wait for all active downloads to complete
    async fn wait_for_active_downloads(&self) {
        loop {
            let active_count = self.active_count().await;
            if active_count == 0 {
                return;
            }

            tracing::debug!(active_count, "Waiting for active downloads to complete");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
