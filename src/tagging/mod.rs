//! Tag writing for finished media files
//!
//! The [`Tagger`] trait is the seam the coordinator calls after a transfer.
//! Implementations:
//!
//! - [`Id3Tagger`]: writes an ID3v2.4 tag using `lofty`
//! - [`NoOpTagger`]: leaves the file untouched (tagging disabled)

mod id3;
mod noop;
mod traits;

pub use id3::Id3Tagger;
pub use noop::NoOpTagger;
pub use traits::Tagger;

use std::sync::Arc;

use crate::config::TaggingConfig;

/// Tagger selected by configuration
pub fn from_config(config: &TaggingConfig) -> Arc<dyn Tagger> {
    if config.enabled {
        Arc::new(Id3Tagger::new(config.clone()))
    } else {
        Arc::new(NoOpTagger)
    }
}
