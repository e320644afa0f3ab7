//! Queue processor: pops pending items in FIFO order and spawns workers.

use super::Coordinator;
use crate::types::Event;

impl Coordinator {
    /// Start the queue processor task
    ///
    /// The processor is a single loop that:
    /// 1. Acquires a permit from the concurrency limiter
    /// 2. Pops the next pending item and spawns a worker holding the permit
    /// 3. If nothing is pending, releases the permit, checks whether the run has
    ///    drained, and sleeps until woken by [`Coordinator::queue`] or a finishing
    ///    worker
    ///
    /// It exits when the processor token is cancelled or the semaphore is closed.
    pub(crate) fn start_queue_processor(&self) {
        let coordinator = self.clone();
        tokio::spawn(async move {
            coordinator.process_queue().await;
            tracing::debug!("Queue processor stopped");
        });
    }

    async fn process_queue(&self) {
        let cancel = self.processor_cancel.clone();
        loop {
            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = self.queue_state.concurrent_limit.clone().acquire_owned() => {
                    match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    }
                }
            };

            // Lock order: pending, then active
            let next = {
                let mut pending = self.queue_state.pending.lock().await;
                let next = pending.pop_front();
                if let Some(item) = &next {
                    self.queue_state
                        .active_downloads
                        .lock()
                        .await
                        .insert(item.date);
                }
                next
            };

            match next {
                Some(item) => {
                    let coordinator = self.clone();
                    tokio::spawn(async move {
                        coordinator.execute(item).await;
                        drop(permit);
                        coordinator.queue_state.work_available.notify_one();
                    });
                }
                None => {
                    drop(permit);
                    self.check_drained().await;
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.queue_state.work_available.notified() => {}
                    }
                }
            }
        }
    }

    /// Mark the run finished and fire listeners if nothing is pending or active
    async fn check_drained(&self) {
        let listeners = {
            let pending = self.queue_state.pending.lock().await;
            let active = self.queue_state.active_downloads.lock().await;
            let mut finish = self.finish_state.lock().await;

            if !pending.is_empty() || !active.is_empty() || !finish.has_work || finish.finished {
                return;
            }
            finish.finished = true;
            std::mem::take(&mut finish.listeners)
        };

        tracing::info!(listeners = listeners.len(), "Download queue drained");
        for listener in listeners {
            listener();
        }
        self.emit_event(Event::Drained);
    }
}
