//! # kfdl
//!
//! Resumable downloader for the daily "Kontrafunk aktuell" broadcasts.
//!
//! ## Overview
//!
//! A run reads the episode feed, skips everything the [`Ledger`] already records
//! as successful, resolves each remaining episode to a verified-reachable URL
//! (official archive first, feed enclosure as fallback) and downloads it under a
//! fixed concurrency bound. Every state transition is recorded in the ledger, a
//! plain text file next to the media, so an interrupted run picks up where it
//! left off.
//!
//! - [`ledger`] - Durable per-item download state
//! - [`resolver`] - Candidate generation and probing
//! - [`coordinator`] - Bounded-concurrency dispatch and lifecycle events
//! - [`feed`] - Feed and metadata sources
//! - [`tagging`] - ID3 tags for finished files
//!
//! ## Quick Start
//!
//! ```no_run
//! use kfdl::{Config, Kfdl};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::for_working_dir("/srv/kontrafunk");
//!     let kfdl = Kfdl::new(config).await?;
//!
//!     // Subscribe to events
//!     let mut events = kfdl.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = kfdl.run().await?;
//!     println!("{} downloaded, {} failed", summary.successful, summary.failed);
//!     kfdl.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Download coordinator (decomposed into focused submodules)
pub mod coordinator;
/// Error types
pub mod error;
/// Feed and metadata sources
pub mod feed;
/// Ledger persistence
pub mod ledger;
/// Top-level run orchestration
pub mod orchestrator;
/// Per-run person and tag interning
pub mod registry;
/// Download URL resolution
pub mod resolver;
/// Tag writing for finished files
pub mod tagging;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{Coordinator, HttpTransfer, Transfer};
pub use error::{DownloadError, Error, LedgerError, Result};
pub use feed::{FeedMetadataSource, FeedSource, MetadataSource, RssFeedSource};
pub use ledger::{Ledger, LedgerEntry};
pub use orchestrator::{Components, Kfdl, RunSummary};
pub use registry::Registry;
pub use resolver::{HttpProbe, Resolution, Resolver, UrlProbe};
pub use tagging::{Id3Tagger, NoOpTagger, Tagger};
pub use types::{DownloadState, EpisodeMetadata, Event, Item, Person, Tag};

/// Helper function to run once with graceful signal handling.
///
/// Runs [`Kfdl::run`] and shuts the coordinator down afterwards. If a
/// termination signal arrives first, the coordinator is shut down right away:
/// pending items are dropped (they stay `QUEUED` in the ledger), active
/// downloads get up to 30 seconds, and the ledger is saved.
///
/// Listens for Ctrl+C everywhere and additionally for SIGTERM on Unix.
///
/// # Example
///
/// ```no_run
/// use kfdl::{Config, Kfdl, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let kfdl = Kfdl::new(Config::for_working_dir(".")).await?;
///
///     // Run with automatic signal handling
///     let summary = run_with_shutdown(&kfdl).await?;
///     println!("{summary:?}");
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(kfdl: &Kfdl) -> Result<RunSummary> {
    let run = kfdl.run();
    tokio::pin!(run);

    tokio::select! {
        summary = &mut run => {
            kfdl.shutdown().await;
            summary
        }
        _ = wait_for_signal() => {
            kfdl.shutdown().await;
            // The run sees the shutdown, stops queuing and returns its summary
            run.await
        }
    }
}

/// Resolves on SIGTERM (Unix) or Ctrl+C
///
/// A signal whose handler cannot be registered is logged and never fires.
async fn wait_for_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = interrupt => tracing::info!("Received SIGINT signal (Ctrl+C)"),
        _ = terminate() => tracing::info!("Received SIGTERM signal"),
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Could not register SIGTERM handler, waiting for Ctrl+C only"
            );
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
