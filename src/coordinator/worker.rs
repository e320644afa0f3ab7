//! Execution of a single item.

use std::path::Path;

use crate::error::{DownloadError, Error, Result};
use crate::types::{DownloadState, Event, Item};

use super::Coordinator;

impl Coordinator {
    /// Run one item to a terminal state
    ///
    /// Called by the queue processor with the item already in the active set.
    /// Errors never escape: they end the item as `Failed` and are logged.
    pub(crate) async fn execute(&self, item: Item) {
        let date = item.date;
        self.emit_event(Event::Started { date });
        self.ledger.record(&item, DownloadState::Downloading).await;
        tracing::info!(date = %date, url = %item.effective_url(), "Download started");

        let destination = self.destination(&item);
        match self.fetch(&item, &destination).await {
            Ok(already_present) => {
                if let Err(e) = self.tag_file(&item, &destination).await {
                    tracing::warn!(
                        date = %date,
                        path = %destination.display(),
                        error = %e,
                        kind = e.kind(),
                        "Failed to write tags"
                    );
                }

                self.ledger.record(&item, DownloadState::Successful).await;
                tracing::info!(
                    date = %date,
                    path = %destination.display(),
                    already_present,
                    "Download completed"
                );
                self.emit_event(Event::Completed {
                    date,
                    path: destination,
                    already_present,
                });
            }
            Err(e) => {
                self.ledger.record(&item, DownloadState::Failed).await;
                tracing::error!(
                    date = %date,
                    url = %item.effective_url(),
                    error = %e,
                    kind = e.kind(),
                    "Download failed"
                );
                self.emit_event(Event::Failed {
                    date,
                    error: e.to_string(),
                });
            }
        }

        // Saved before leaving the active set so a drained queue is on disk
        if let Err(e) = self.ledger.save_if_due(self.settings.save_interval).await {
            tracing::warn!(error = %e, kind = e.kind(), "Ledger save failed, will retry later");
        }

        self.remove_from_active(&item).await;
    }

    /// Write tags in a separate task; a panicking tagger becomes a tagging error
    async fn tag_file(&self, item: &Item, destination: &Path) -> Result<()> {
        let tagger = self.tagger.clone();
        let task_item = item.clone();
        let path = destination.to_path_buf();

        tokio::spawn(async move { tagger.tag(&path, &task_item).await })
            .await
            .unwrap_or_else(|join_error| {
                Err(Error::Tagging(format!(
                    "{} tagger panicked: {join_error}",
                    self.tagger.name()
                )))
            })
    }

    /// Fetch the item unless its destination already exists
    ///
    /// Returns whether the file was already present. The transfer runs in its own
    /// task so a panic inside it is contained and reported as an error.
    async fn fetch(&self, item: &Item, destination: &Path) -> Result<bool> {
        if tokio::fs::try_exists(destination).await.unwrap_or(false) {
            tracing::info!(
                date = %item.date,
                path = %destination.display(),
                "File already present, skipping transfer"
            );
            return Ok(true);
        }

        let transfer = self.transfer.clone();
        let url = item.effective_url().to_string();
        let target = destination.to_path_buf();
        let timeout = self.settings.transfer_timeout;

        let task_url = url.clone();
        let handle = tokio::spawn(async move {
            tokio::time::timeout(timeout, transfer.fetch(&task_url, &target)).await
        });

        match handle.await {
            Ok(Ok(result)) => result.map(|()| false),
            Ok(Err(_elapsed)) => Err(DownloadError::Timeout {
                url,
                after: timeout,
            }
            .into()),
            Err(join_error) => {
                tracing::error!(date = %item.date, error = %join_error, "Transfer task panicked");
                Err(DownloadError::TaskPanicked { date: item.date }.into())
            }
        }
    }

    async fn remove_from_active(&self, item: &Item) {
        self.queue_state
            .active_downloads
            .lock()
            .await
            .remove(&item.date);
    }
}
