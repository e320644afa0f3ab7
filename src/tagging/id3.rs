//! ID3v2 tag writing with lofty

use async_trait::async_trait;
use lofty::config::WriteOptions;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt, TagType};
use std::path::Path;

use super::traits::Tagger;
use crate::config::TaggingConfig;
use crate::error::{Error, Result};
use crate::types::Item;

const SEPARATOR: &str = "; ";

/// Writes an ID3v2.4 tag built from the item and its metadata
#[derive(Clone, Debug)]
pub struct Id3Tagger {
    config: TaggingConfig,
}

impl Id3Tagger {
    /// Create a tagger writing the configured album values
    pub fn new(config: TaggingConfig) -> Self {
        Self { config }
    }

    /// Build the tag written for `item`
    pub(crate) fn build_tag(&self, item: &Item) -> Tag {
        let mut tag = Tag::new(TagType::Id3v2);

        tag.set_title(item.title.clone());
        tag.set_album(self.config.album.clone());
        tag.insert_text(ItemKey::AlbumArtist, self.config.album_artist.clone());
        tag.insert_text(ItemKey::Language, self.config.language.clone());
        tag.insert_text(ItemKey::RecordingDate, item.date.to_string());
        tag.insert_text(ItemKey::OriginalReleaseDate, item.date.to_string());

        let description = item
            .metadata
            .description
            .as_ref()
            .or(item.description.as_ref());
        if let Some(description) = description {
            tag.set_comment(description.clone());
        }

        let artists: Vec<&str> = item
            .metadata
            .participants()
            .into_iter()
            .map(|person| person.name())
            .collect();
        if !artists.is_empty() {
            tag.set_artist(artists.join(SEPARATOR));
        }

        let genres: Vec<&str> = item.metadata.tags.iter().map(|t| t.name()).collect();
        if !genres.is_empty() {
            tag.set_genre(genres.join(SEPARATOR));
        }

        tag
    }
}

#[async_trait]
impl Tagger for Id3Tagger {
    async fn tag(&self, path: &Path, item: &Item) -> Result<()> {
        let tag = self.build_tag(item);
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || tag.save_to_path(&path, WriteOptions::default()))
            .await
            .map_err(|e| Error::Tagging(format!("tagging task failed: {e}")))?
            .map_err(|e| Error::Tagging(e.to_string()))?;

        tracing::debug!(date = %item.date, "Tags written");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "id3"
    }
}
