//! Feed and metadata sources
//!
//! [`FeedSource`] lists the items a run considers; [`MetadataSource`] enriches
//! one item before resolution. [`RssFeedSource`] reads an RSS 2.0 feed and falls
//! back to Atom if the document is not RSS.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate};
use regex::Regex;
use std::sync::{Arc, LazyLock};

use crate::config::FeedConfig;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::types::{EpisodeMetadata, Item, Tag};

/// `"... vom 22. Januar 2024"`, `"... am 3. Oktober"`
static TITLE_DATE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    let pattern = r"(?i)\b(?:vom|am|aktuell)\s+(\d{1,2})\.\s*([a-zä]+)(?:\s+(\d{4}|\d{2})\b)?";
    Regex::new(pattern).ok()
});

/// `"... vom 9.8.2023"`, `"... aktuell 09.08.22"`
static NUMERIC_TITLE_DATE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    let pattern = r"(?i)\b(?:vom|am|aktuell)\s+(\d{1,2})\.\s*(\d{1,2})\.\s*(\d{4}|\d{2})\b";
    Regex::new(pattern).ok()
});

const GERMAN_MONTHS: [&str; 12] = [
    "januar",
    "februar",
    "märz",
    "april",
    "mai",
    "juni",
    "juli",
    "august",
    "september",
    "oktober",
    "november",
    "dezember",
];

/// Source of the items a run considers
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch all items currently listed
    ///
    /// A failure here aborts the run.
    async fn items(&self, registry: &Registry) -> Result<Vec<Item>>;
}

/// Source of per-item metadata
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Metadata for `item`
    ///
    /// A failure skips the item for this run.
    async fn metadata(&self, item: &Item, registry: &Registry) -> Result<EpisodeMetadata>;
}

/// Metadata source returning what the feed already provided
#[derive(Clone, Copy, Debug, Default)]
pub struct FeedMetadataSource;

#[async_trait]
impl MetadataSource for FeedMetadataSource {
    async fn metadata(&self, item: &Item, _registry: &Registry) -> Result<EpisodeMetadata> {
        Ok(item.metadata.clone())
    }
}

/// Feed source reading RSS 2.0 or Atom over HTTP
#[derive(Clone)]
pub struct RssFeedSource {
    url: String,
    http_client: reqwest::Client,
}

impl RssFeedSource {
    /// Create a feed source for the configured URL
    pub fn new(config: &FeedConfig, user_agent: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            url: config.url.clone(),
            http_client,
        })
    }

    async fn fetch(&self) -> Result<String> {
        let response = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::Feed(format!("failed to fetch feed {}: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Feed(format!(
                "feed returned HTTP {}: {}",
                status.as_u16(),
                self.url
            )));
        }

        response
            .text()
            .await
            .map_err(|e| Error::Feed(format!("failed to read feed content: {}", e)))
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    async fn items(&self, registry: &Registry) -> Result<Vec<Item>> {
        tracing::debug!(url = %self.url, "Fetching feed");
        let content = self.fetch().await?;
        let items = parse_feed(&content, registry)?;
        tracing::info!(url = %self.url, items = items.len(), "Feed fetched");
        Ok(items)
    }
}

/// Parse feed content, trying RSS first and Atom second
pub(crate) fn parse_feed(content: &str, registry: &Registry) -> Result<Vec<Item>> {
    match parse_as_rss(content, registry) {
        Ok(items) => Ok(items),
        Err(rss_err) => {
            tracing::debug!(error = %rss_err, "Failed to parse as RSS, trying Atom");
            parse_as_atom(content, registry).map_err(|atom_err| {
                Error::Feed(format!(
                    "failed to parse feed as RSS or Atom. RSS error: {}. Atom error: {}",
                    rss_err, atom_err
                ))
            })
        }
    }
}

fn parse_as_rss(content: &str, registry: &Registry) -> Result<Vec<Item>> {
    let channel = content
        .parse::<rss::Channel>()
        .map_err(|e| Error::Feed(format!("RSS parse error: {}", e)))?;

    let mut items = Vec::with_capacity(channel.items().len());
    for entry in channel.items() {
        let title = entry.title().unwrap_or_default().trim().to_string();
        let published = entry
            .pub_date()
            .and_then(|date| DateTime::parse_from_rfc2822(date.trim()).ok())
            .map(|date| date.date_naive());
        let Some(date) = item_date(&title, published) else {
            tracing::warn!(title = %title, "Feed item has no usable date, skipping");
            continue;
        };

        let Some(fallback_url) = entry
            .enclosure()
            .map(|enclosure| enclosure.url().to_string())
            .or_else(|| entry.link().map(str::to_string))
        else {
            tracing::warn!(date = %date, title = %title, "Feed item has no media URL, skipping");
            continue;
        };

        let metadata = EpisodeMetadata {
            page_url: entry.link().map(str::to_string),
            host: entry
                .itunes_ext()
                .and_then(|itunes| itunes.author())
                .filter(|author| !author.trim().is_empty())
                .map(|author| registry.person(author)),
            tags: unique_tags(
                registry,
                entry.categories().iter().map(|category| category.name()),
            ),
            ..Default::default()
        };

        let mut item = Item::new(date, title, fallback_url).with_metadata(metadata);
        item.description = entry.description().map(str::to_string);
        items.push(item);
    }

    Ok(items)
}

fn parse_as_atom(content: &str, registry: &Registry) -> Result<Vec<Item>> {
    let feed = atom_syndication::Feed::read_from(content.as_bytes())
        .map_err(|e| Error::Feed(format!("Atom parse error: {}", e)))?;

    let mut items = Vec::with_capacity(feed.entries().len());
    for entry in feed.entries() {
        let title = entry.title().as_str().trim().to_string();
        // Prefer published, fall back to updated
        let published = entry.published().unwrap_or(entry.updated()).date_naive();
        let Some(date) = item_date(&title, Some(published)) else {
            continue;
        };

        let enclosure = entry
            .links()
            .iter()
            .find(|link| link.rel() == "enclosure")
            .or_else(|| entry.links().first());
        let Some(fallback_url) = enclosure.map(|link| link.href().to_string()) else {
            tracing::warn!(date = %date, title = %title, "Feed entry has no media URL, skipping");
            continue;
        };

        let metadata = EpisodeMetadata {
            page_url: entry
                .links()
                .iter()
                .find(|link| link.rel() == "alternate")
                .map(|link| link.href().to_string()),
            host: entry
                .authors()
                .first()
                .map(|author| registry.person(author.name())),
            tags: unique_tags(
                registry,
                entry
                    .categories()
                    .iter()
                    .map(|category| category.label().unwrap_or(category.term())),
            ),
            ..Default::default()
        };

        let mut item = Item::new(date, title, fallback_url).with_metadata(metadata);
        item.description = entry.summary().map(|summary| summary.as_str().to_string());
        items.push(item);
    }

    Ok(items)
}

fn unique_tags<'a>(registry: &Registry, names: impl Iterator<Item = &'a str>) -> Vec<Tag> {
    let mut tags: Vec<Tag> = Vec::new();
    for name in names.map(str::trim).filter(|name| !name.is_empty()) {
        let tag = registry.tag(name);
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Date an item is keyed by
///
/// Episodes name their broadcast date in the title ("... vom 22. Januar 2024"),
/// which can differ from the publication date. The publication date is used when
/// the title carries none.
fn item_date(title: &str, published: Option<NaiveDate>) -> Option<NaiveDate> {
    title_date(title, published).or(published)
}

/// Broadcast date named in a title
///
/// Accepts month names and numeric dates after "vom", "am" or "aktuell".
/// Two-digit years are in the 2000s. A title without a year takes it from the
/// publication date, moved back a year if that would put the broadcast more than
/// a month after publication.
fn title_date(title: &str, published: Option<NaiveDate>) -> Option<NaiveDate> {
    let (day, month, year) = numeric_title_date(title).or_else(|| named_title_date(title))?;

    let Some(year) = year else {
        let published = published?;
        let date = NaiveDate::from_ymd_opt(published.year(), month, day)?;
        if date > published + Duration::days(31) {
            return NaiveDate::from_ymd_opt(published.year() - 1, month, day);
        }
        return Some(date);
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn numeric_title_date(title: &str) -> Option<(u32, u32, Option<i32>)> {
    let captures = NUMERIC_TITLE_DATE.as_ref()?.captures(title)?;
    let day = captures[1].parse().ok()?;
    let month = captures[2].parse().ok()?;
    let year = parse_year(&captures[3])?;
    Some((day, month, Some(year)))
}

fn named_title_date(title: &str) -> Option<(u32, u32, Option<i32>)> {
    let captures = TITLE_DATE.as_ref()?.captures(title)?;
    let day = captures[1].parse().ok()?;
    let month_name = captures[2].to_lowercase();
    let month = GERMAN_MONTHS
        .iter()
        .position(|name| *name == month_name)
        .and_then(|index| u32::try_from(index + 1).ok())?;
    let year = match captures.get(3) {
        Some(year) => Some(parse_year(year.as_str())?),
        None => None,
    };
    Some((day, month, year))
}

fn parse_year(digits: &str) -> Option<i32> {
    let year: i32 = digits.parse().ok()?;
    Some(if digits.len() == 2 { 2000 + year } else { year })
}

/// Title filter built from `exclude_title_patterns`
#[derive(Clone, Debug)]
pub struct TitleFilter {
    patterns: Arc<Vec<Regex>>,
}

impl TitleFilter {
    /// Compile the patterns
    pub fn new(patterns: &[String]) -> Result<Self> {
        let compiled = patterns
            .iter()
            .map(|pattern| {
                regex::RegexBuilder::new(pattern)
                    .size_limit(1024 * 1024)
                    .build()
                    .map_err(|e| {
                        Error::config("exclude_title_patterns", format!("{pattern:?}: {e}"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            patterns: Arc::new(compiled),
        })
    }

    /// Whether an item with this title is excluded
    pub fn excludes(&self, title: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(title))
    }
}
