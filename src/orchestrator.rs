//! The top-level run: feed → filter → resume check → metadata → resolve → queue.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::Config;
use crate::coordinator::{Coordinator, HttpTransfer, Transfer};
use crate::error::{Error, Result};
use crate::feed::{FeedMetadataSource, FeedSource, MetadataSource, RssFeedSource, TitleFilter};
use crate::ledger::Ledger;
use crate::registry::Registry;
use crate::resolver::{HttpProbe, Resolver, UrlProbe};
use crate::tagging::{self, Tagger};
use crate::types::{DownloadState, Event};

/// Counters describing one run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Items listed by the feed
    pub found: usize,
    /// Items dropped by a title exclusion pattern
    pub excluded: usize,
    /// Items skipped because the ledger already records them as successful
    pub already_complete: usize,
    /// Items with no reachable URL (not recorded in the ledger)
    pub unresolved: usize,
    /// Items skipped because their metadata could not be obtained
    pub metadata_failures: usize,
    /// Items handed to the coordinator
    pub queued: usize,
    /// Queued items that ended successful
    pub successful: usize,
    /// Queued items that ended failed
    pub failed: usize,
}

/// Collaborators of a [`Kfdl`] instance
///
/// [`Components::http`] builds the production set; individual fields can be
/// replaced before passing it to [`Kfdl::with_components`].
pub struct Components {
    /// Lists the items of a run
    pub feed: Arc<dyn FeedSource>,
    /// Enriches items before resolution
    pub metadata: Arc<dyn MetadataSource>,
    /// Checks candidate URLs
    pub probe: Arc<dyn UrlProbe>,
    /// Performs transfers
    pub transfer: Arc<dyn Transfer>,
    /// Writes tags into finished files
    pub tagger: Arc<dyn Tagger>,
}

impl Components {
    /// HTTP feed, probe and transfer with the tagger selected by configuration
    pub fn http(config: &Config) -> Result<Self> {
        let user_agent = config.download.user_agent.as_str();
        Ok(Self {
            feed: Arc::new(RssFeedSource::new(&config.feed, user_agent)?),
            metadata: Arc::new(FeedMetadataSource),
            probe: Arc::new(HttpProbe::new(config.resolver.probe_timeout, user_agent)?),
            transfer: Arc::new(HttpTransfer::new(user_agent)?),
            tagger: tagging::from_config(&config.tagging),
        })
    }
}

/// Downloader for one working directory
pub struct Kfdl {
    registry: Registry,
    ledger: Ledger,
    feed: Arc<dyn FeedSource>,
    metadata: Arc<dyn MetadataSource>,
    resolver: Resolver,
    coordinator: Coordinator,
    title_filter: TitleFilter,
}

impl Kfdl {
    /// Create an instance with the production components
    ///
    /// Loads the ledger and starts the coordinator, so it must be called from
    /// within a Tokio runtime.
    pub async fn new(config: Config) -> Result<Self> {
        let components = Components::http(&config)?;
        Self::with_components(config, components).await
    }

    /// Create an instance with the given components
    pub async fn with_components(config: Config, components: Components) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.download.working_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create working directory '{}': {}",
                        config.download.working_dir.display(),
                        e
                    ),
                ))
            })?;

        let ledger = Ledger::load(config.ledger_path()).await;
        let title_filter = TitleFilter::new(&config.feed.exclude_title_patterns)?;
        let resolver = Resolver::new(config.resolver.clone(), components.probe);
        let coordinator = Coordinator::new(
            &config,
            ledger.clone(),
            components.transfer,
            components.tagger,
        )?;

        Ok(Self {
            registry: Registry::new(),
            ledger,
            feed: components.feed,
            metadata: components.metadata,
            resolver,
            coordinator,
            title_filter,
        })
    }

    /// The ledger of this instance
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// The coordinator of this instance
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Subscribe to download events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.coordinator.subscribe()
    }

    /// Download everything the feed lists that is not already complete
    ///
    /// Per-item problems are counted in the summary and never fail the run.
    ///
    /// # Errors
    ///
    /// Returns an error only if the feed cannot be fetched or parsed.
    pub async fn run(&self) -> Result<RunSummary> {
        let items = self.feed.items(&self.registry).await?;
        let mut summary = RunSummary {
            found: items.len(),
            ..Default::default()
        };
        tracing::info!(found = summary.found, "Starting run");

        let mut seen = HashSet::new();
        let mut queued_dates = Vec::new();

        for item in items {
            if self.title_filter.excludes(&item.title) {
                tracing::debug!(date = %item.date, title = %item.title, "Excluded by title");
                summary.excluded += 1;
                continue;
            }
            if !seen.insert(item.date) {
                tracing::warn!(
                    date = %item.date,
                    title = %item.title,
                    "Duplicate item date in feed, skipping"
                );
                continue;
            }
            if self.ledger.state_of(item.date).await == Some(DownloadState::Successful) {
                tracing::debug!(date = %item.date, "Already downloaded");
                summary.already_complete += 1;
                continue;
            }

            let metadata = match self.metadata.metadata(&item, &self.registry).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(
                        date = %item.date,
                        error = %e,
                        kind = e.kind(),
                        "Failed to obtain metadata, skipping item for this run"
                    );
                    summary.metadata_failures += 1;
                    continue;
                }
            };
            let item = item.with_metadata(metadata);

            let Some(resolved) = self.resolver.resolve(&item).await.apply(&item) else {
                summary.unresolved += 1;
                continue;
            };

            let date = resolved.date;
            match self.coordinator.queue(resolved).await {
                Ok(()) => {
                    summary.queued += 1;
                    queued_dates.push(date);
                }
                Err(Error::ShuttingDown) => {
                    tracing::warn!("Shutdown in progress, not queuing further items");
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        if summary.queued > 0 {
            self.coordinator.wait_until_drained().await;
        }

        if let Err(e) = self.ledger.force_save().await {
            tracing::error!(error = %e, kind = e.kind(), "Final ledger save failed");
        }

        for date in queued_dates {
            match self.ledger.state_of(date).await {
                Some(DownloadState::Successful) => summary.successful += 1,
                Some(DownloadState::Failed) => summary.failed += 1,
                _ => {}
            }
        }

        tracing::info!(
            found = summary.found,
            excluded = summary.excluded,
            already_complete = summary.already_complete,
            unresolved = summary.unresolved,
            metadata_failures = summary.metadata_failures,
            queued = summary.queued,
            successful = summary.successful,
            failed = summary.failed,
            "Run complete"
        );
        Ok(summary)
    }

    /// Gracefully shut down the coordinator (final ledger save included)
    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
    }
}
