//! Tagger that leaves files untouched

use async_trait::async_trait;
use std::path::Path;

use super::traits::Tagger;
use crate::types::Item;

/// Tagger used when tag writing is disabled
///
/// ```
/// use kfdl::tagging::{NoOpTagger, Tagger};
/// use kfdl::Item;
/// use chrono::NaiveDate;
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() {
/// let date = NaiveDate::from_ymd_opt(2024, 1, 22).unwrap();
/// let item = Item::new(date, "Episode", "https://cdn.example/a.mp3");
/// assert!(NoOpTagger.tag(Path::new("missing.mp3"), &item).await.is_ok());
/// # }
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpTagger;

#[async_trait]
impl Tagger for NoOpTagger {
    async fn tag(&self, _path: &Path, _item: &Item) -> crate::Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
