//! Tagger seam

use async_trait::async_trait;
use std::path::Path;

use crate::types::Item;

/// Writes descriptive metadata into a finished media file
///
/// Called once per successfully transferred item (and for files that were
/// already present). A failure is logged by the caller and never changes the
/// item's download state.
///
/// # Examples
///
/// ```no_run
/// use kfdl::config::TaggingConfig;
/// use kfdl::tagging::{Id3Tagger, Tagger};
/// use kfdl::Item;
/// use chrono::NaiveDate;
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let tagger = Id3Tagger::new(TaggingConfig::default());
/// let date = NaiveDate::from_ymd_opt(2024, 1, 22).unwrap();
/// let title = "Kontrafunk aktuell vom 22. Januar 2024";
/// let item = Item::new(date, title, "https://cdn.example/a.mp3");
///
/// tagger.tag(Path::new("2024-01-22.mp3"), &item).await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Tagger: Send + Sync {
    /// Write tags for `item` into the file at `path`
    async fn tag(&self, path: &Path, item: &Item) -> crate::Result<()>;

    /// Name of the implementation, for logging
    fn name(&self) -> &'static str;
}
