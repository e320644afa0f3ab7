//! Core types for kfdl

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Download lifecycle state of an item as recorded in the ledger
///
/// Transitions are strictly `Queued → Downloading → {Successful | Failed}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadState {
    /// Accepted by the coordinator, waiting for a free worker
    Queued,
    /// A worker is transferring the file
    Downloading,
    /// Transfer finished (tagging is best-effort and does not affect this)
    Successful,
    /// Transfer failed
    Failed,
}

impl DownloadState {
    /// Token used for this state in the ledger file
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadState::Queued => "QUEUED",
            DownloadState::Downloading => "DOWNLOADING",
            DownloadState::Successful => "SUCCESSFUL",
            DownloadState::Failed => "FAILED",
        }
    }

    /// Whether no further automatic transition occurs from this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadState::Successful | DownloadState::Failed)
    }
}

impl std::fmt::Display for DownloadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DownloadState {
    /// The unrecognized token
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(DownloadState::Queued),
            "DOWNLOADING" => Ok(DownloadState::Downloading),
            "SUCCESSFUL" => Ok(DownloadState::Successful),
            "FAILED" => Ok(DownloadState::Failed),
            other => Err(other.to_string()),
        }
    }
}

/// A participant of an episode (host, guest, comment author)
///
/// Created through [`crate::registry::Registry`] so equal names share one allocation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Person(Arc<str>);

impl Person {
    pub(crate) fn new(name: Arc<str>) -> Self {
        Self(name)
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// A topic tag
///
/// Tags compare by their case-folded id; the name is the first spelling seen.
#[derive(Clone, Debug, Serialize)]
pub struct Tag {
    id: Arc<str>,
    name: Arc<str>,
}

impl Tag {
    pub(crate) fn new(id: Arc<str>, name: Arc<str>) -> Self {
        Self { id, name }
    }

    /// Case-folded identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Tag {}

impl std::hash::Hash for Tag {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Per-item metadata merged from the feed and the metadata source
#[derive(Clone, Debug, Default)]
pub struct EpisodeMetadata {
    /// Page describing the episode, if known
    pub page_url: Option<String>,
    /// Host of the episode
    pub host: Option<Person>,
    /// Guests, in page order
    pub guests: Vec<Person>,
    /// Author of the closing commentary
    pub comment_author: Option<Person>,
    /// Long description (preferred over the feed description when tagging)
    pub description: Option<String>,
    /// Download link found on the episode page; tried before generated candidates
    pub download_link: Option<String>,
    /// Topic tags
    pub tags: Vec<Tag>,
}

impl EpisodeMetadata {
    /// Host, guests and comment author in that order, without duplicates
    pub fn participants(&self) -> Vec<&Person> {
        let mut people: Vec<&Person> = Vec::new();
        let all = self
            .host
            .iter()
            .chain(self.guests.iter())
            .chain(self.comment_author.iter());
        for person in all {
            if !people.contains(&person) {
                people.push(person);
            }
        }
        people
    }
}

/// One unit of downloadable media
///
/// Items are keyed by publication date. They are not mutated after construction;
/// [`Item::with_download_url`] returns a new value carrying the resolved URL.
#[derive(Clone, Debug)]
pub struct Item {
    /// Publication date, the unique key of the item
    pub date: NaiveDate,
    /// Title as published in the feed
    pub title: String,
    /// Short description from the feed
    pub description: Option<String>,
    /// Source URL from the feed (always present, possibly partial)
    pub fallback_url: String,
    /// URL chosen by the resolver
    pub download_url: Option<String>,
    /// Metadata used for resolution and tagging
    pub metadata: EpisodeMetadata,
}

impl Item {
    /// Create an item with no resolved URL and empty metadata
    pub fn new(
        date: NaiveDate,
        title: impl Into<String>,
        fallback_url: impl Into<String>,
    ) -> Self {
        Self {
            date,
            title: title.into(),
            description: None,
            fallback_url: fallback_url.into(),
            download_url: None,
            metadata: EpisodeMetadata::default(),
        }
    }

    /// Copy of this item with the given resolved download URL
    pub fn with_download_url(&self, url: impl Into<String>) -> Self {
        Self {
            download_url: Some(url.into()),
            ..self.clone()
        }
    }

    /// Copy of this item with the given metadata
    pub fn with_metadata(&self, metadata: EpisodeMetadata) -> Self {
        Self {
            metadata,
            ..self.clone()
        }
    }

    /// The chosen download URL, or the fallback URL if none was chosen
    pub fn effective_url(&self) -> &str {
        self.download_url.as_deref().unwrap_or(&self.fallback_url)
    }

    /// Name of the local media file (`yyyy-mm-dd.mp3`)
    pub fn file_name(&self) -> String {
        format!("{}.mp3", self.date)
    }
}

/// Event emitted during the download lifecycle
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Item added to the pending queue
    Queued {
        /// Item date
        date: NaiveDate,
        /// Item title
        title: String,
    },

    /// A worker picked the item up
    Started {
        /// Item date
        date: NaiveDate,
    },

    /// Transfer finished (or the file was already present)
    Completed {
        /// Item date
        date: NaiveDate,
        /// Local media file
        path: PathBuf,
        /// Whether the transfer was skipped because the file existed
        already_present: bool,
    },

    /// Transfer failed
    Failed {
        /// Item date
        date: NaiveDate,
        /// Error message
        error: String,
    },

    /// Pending queue empty and no downloads active
    Drained,

    /// Coordinator shut down
    Shutdown,
}
