//! Per-run interning of people and tags.
//!
//! A [`Registry`] is constructed once per run and handed by reference to every
//! collaborator that turns names into [`Person`]s or [`Tag`]s, so the same name
//! always yields the same value within a run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::types::{Person, Tag};

/// Name → entity registry shared by the adapters of one run
#[derive(Debug, Default)]
pub struct Registry {
    persons: Mutex<HashMap<String, Person>>,
    tags: Mutex<HashMap<String, Tag>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the person with this name (surrounding whitespace ignored)
    pub fn person(&self, name: &str) -> Person {
        let name = name.trim();
        let mut persons = self.persons.lock().unwrap_or_else(PoisonError::into_inner);
        persons
            .entry(name.to_string())
            .or_insert_with(|| Person::new(Arc::from(name)))
            .clone()
    }

    /// Get or create the tag with this name
    ///
    /// Tags are keyed by their lowercase form; the first spelling seen is kept as
    /// the display name.
    pub fn tag(&self, name: &str) -> Tag {
        let name = name.trim();
        let id = name.to_lowercase();
        let mut tags = self.tags.lock().unwrap_or_else(PoisonError::into_inner);
        tags.entry(id.clone())
            .or_insert_with(|| Tag::new(Arc::from(id.as_str()), Arc::from(name)))
            .clone()
    }

    /// All tags seen so far, sorted by id
    pub fn tags(&self) -> Vec<Tag> {
        let tags = self.tags.lock().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<Tag> = tags.values().cloned().collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }
}
