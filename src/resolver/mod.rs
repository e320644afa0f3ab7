//! Download URL resolution
//!
//! Turns an [`Item`] into one verified-reachable URL without transferring the file.
//!
//! ## Order of attempts
//!
//! 1. Items dated before [`ResolverConfig::official_since`], or listed in
//!    [`ResolverConfig::secondary_only_dates`], skip the official source.
//! 2. Otherwise every official candidate is probed in order (see
//!    [`Resolver::candidates`]); the first reachable one wins and nothing after it
//!    is probed.
//! 3. If no candidate is reachable, the item's fallback URL is used if it is an
//!    absolute http(s) URL on a host that is not blocked.
//! 4. Otherwise the item is [`Resolution::NotFound`].

mod candidates;
mod probe;


pub use probe::{HttpProbe, UrlProbe};

use std::sync::Arc;

use crate::config::ResolverConfig;
use crate::error::Error;
use crate::types::Item;

/// Outcome of resolving one item
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// A probed official candidate
    Official(String),
    /// The item's fallback URL
    Fallback(String),
    /// Nothing usable
    NotFound,
}

impl Resolution {
    /// The resolved URL, if any
    pub fn url(&self) -> Option<&str> {
        match self {
            Resolution::Official(url) | Resolution::Fallback(url) => Some(url),
            Resolution::NotFound => None,
        }
    }

    /// Apply the resolved URL to `item`
    pub fn apply(&self, item: &Item) -> Option<Item> {
        self.url().map(|url| item.with_download_url(url))
    }
}

/// Resolves items against the official source with a fallback
#[derive(Clone)]
pub struct Resolver {
    config: Arc<ResolverConfig>,
    probe: Arc<dyn UrlProbe>,
}

impl Resolver {
    /// Create a resolver using the given probe
    pub fn new(config: ResolverConfig, probe: Arc<dyn UrlProbe>) -> Self {
        Self {
            config: Arc::new(config),
            probe,
        }
    }

    /// Official candidates for `item`, in probe order
    ///
    /// Empty if the official source does not cover the item's date.
    pub fn candidates(&self, item: &Item) -> Vec<String> {
        if !candidates::uses_official_source(&self.config, item.date) {
            return Vec::new();
        }
        candidates::official_candidates(
            &self.config,
            item.date,
            item.metadata.download_link.as_deref(),
        )
    }

    /// Resolve `item` to a reachable URL
    pub async fn resolve(&self, item: &Item) -> Resolution {
        if candidates::uses_official_source(&self.config, item.date) {
            for url in self.candidates(item) {
                match self.probe.probe(&url).await {
                    Ok(true) => {
                        tracing::info!(date = %item.date, url = %url, "Resolved official URL");
                        return Resolution::Official(url);
                    }
                    Ok(false) => {
                        tracing::debug!(date = %item.date, url = %url, "Candidate not reachable");
                    }
                    Err(e) => {
                        tracing::debug!(
                            date = %item.date,
                            url = %url,
                            error = %e,
                            "Candidate probe failed"
                        );
                    }
                }
            }
        } else {
            tracing::debug!(
                date = %item.date,
                "Official source does not cover this date, using fallback"
            );
        }

        match candidates::usable_fallback(&self.config, &item.fallback_url) {
            Some(url) => {
                tracing::info!(date = %item.date, url = %url, "Resolved fallback URL");
                Resolution::Fallback(url)
            }
            None => {
                let e = Error::Resolution { date: item.date };
                tracing::warn!(
                    date = %item.date,
                    fallback = %item.fallback_url,
                    error = %e,
                    kind = e.kind(),
                    "No reachable download URL"
                );
                Resolution::NotFound
            }
        }
    }
}
