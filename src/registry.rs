use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    error::{LibraryError, LibraryResult},
    media::MediaKind,
};

/// A circulating catalog item and its copy counts
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Item {
    /// Unique, immutable identifier
    pub id: String,
    /// Display title
    pub title: String,
    /// Author or director
    pub author: String,
    /// Medium, which fixes the loan period
    pub kind: MediaKind,
    /// Subject tags used for search and recommendations
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Copies the library owns
    pub copies_total: u32,
    /// Copies currently on the shelf
    pub copies_available: u32,
}

impl Item {
    /// Create an item with every copy available and no tags
    #[must_use]
    pub fn new(id: &str, title: &str, author: &str, kind: MediaKind, copies_total: u32) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            author: author.to_string(),
            kind,
            tags: BTreeSet::new(),
            copies_total,
            copies_available: copies_total,
        }
    }

    /// Replace the tag set
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Whether at least one copy is on the shelf
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.copies_available > 0
    }

    /// Number of tags shared with `other`
    #[must_use]
    pub fn shared_tags(&self, other: &BTreeSet<String>) -> usize {
        self.tags.intersection(other).count()
    }
}

/// Filter for [`ItemRegistry::search`]; empty fields match everything
#[derive(Debug, Clone, Default)]
pub struct CatalogQuery {
    /// Case-insensitive substring of the title or author
    pub text: Option<String>,
    /// Case-insensitive substring of the author
    pub author: Option<String>,
    /// Case-insensitive exact tag
    pub tag: Option<String>,
    /// `Some(true)` keeps items with a free copy, `Some(false)` those without
    pub available: Option<bool>,
}

impl CatalogQuery {
    /// Check a single item against every populated field
    fn matches(&self, item: &Item) -> bool {
        let contains = |haystack: &str, needle: &str| {
            haystack.to_lowercase().contains(&needle.trim().to_lowercase())
        };

        let text_match = self
            .text
            .as_deref()
            .is_none_or(|q| contains(&item.title, q) || contains(&item.author, q));
        let author_match = self.author.as_deref().is_none_or(|a| contains(&item.author, a));
        let tag_match = self.tag.as_deref().is_none_or(|wanted| {
            let wanted = wanted.trim();
            item.tags.iter().any(|t| t.eq_ignore_ascii_case(wanted))
        });
        let availability_match = self.available.is_none_or(|want| item.is_available() == want);

        text_match && author_match && tag_match && availability_match
    }
}

/// Holds every item known to the library, keyed by id
#[derive(Debug, Clone, Default)]
pub struct ItemRegistry {
    /// Items ordered by id
    items: BTreeMap<String, Item>,
}

impl ItemRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item to the catalog with all of its copies available
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::DuplicateItem` if the id is already registered
    pub fn register(&mut self, mut item: Item) -> LibraryResult<&Item> {
        if self.items.contains_key(&item.id) {
            return Err(LibraryError::DuplicateItem { item_id: item.id });
        }

        item.copies_available = item.copies_total;
        tracing::debug!(
            item_id = %item.id,
            kind = item.kind.label(),
            copies = item.copies_total,
            "registered item"
        );

        let id = item.id.clone();
        Ok(self.items.entry(id).or_insert(item))
    }

    /// Loan period for a media kind
    #[must_use]
    pub const fn loan_period_days(kind: MediaKind) -> u32 {
        kind.loan_period_days()
    }

    /// Change the number of available copies by `delta`
    ///
    /// Returns the new available count.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::UnknownItem` if the item does not exist, or
    /// `LibraryError::InvalidAdjustment` if the result would be negative or
    /// exceed the total owned. Nothing changes on error.
    pub fn adjust_copies(&mut self, item_id: &str, delta: i64) -> LibraryResult<u32> {
        let item = self.get_mut(item_id)?;

        let adjusted = i64::from(item.copies_available).checked_add(delta);
        let next = adjusted
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n <= item.copies_total)
            .ok_or_else(|| LibraryError::InvalidAdjustment {
                item_id: item_id.to_string(),
                delta,
                available: item.copies_available,
                total: item.copies_total,
            })?;

        item.copies_available = next;
        Ok(next)
    }

    /// Look up an item
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::UnknownItem` if no item has this id
    pub fn get(&self, item_id: &str) -> LibraryResult<&Item> {
        self.items
            .get(item_id)
            .ok_or_else(|| LibraryError::UnknownItem { item_id: item_id.to_string() })
    }

    /// Mutable lookup, private so copy counts only move through `adjust_copies`
    fn get_mut(&mut self, item_id: &str) -> LibraryResult<&mut Item> {
        self.items
            .get_mut(item_id)
            .ok_or_else(|| LibraryError::UnknownItem { item_id: item_id.to_string() })
    }

    /// Whether an item with this id exists
    #[must_use]
    pub fn contains(&self, item_id: &str) -> bool {
        self.items.contains_key(item_id)
    }

    /// All items in id order
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Number of registered items
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items matching every populated field of `query`, in id order
    #[must_use]
    pub fn search(&self, query: &CatalogQuery) -> Vec<&Item> {
        self.items.values().filter(|item| query.matches(item)).collect()
    }

    /// Rebuild a registry from stored items without resetting copy counts
    pub(crate) fn from_items(items: Vec<Item>) -> LibraryResult<Self> {
        let mut registry = Self::new();
        for item in items {
            if item.copies_available > item.copies_total {
                return Err(LibraryError::InvalidSnapshot(format!(
                    "item {} has {} of {} copies available",
                    item.id, item.copies_available, item.copies_total
                )));
            }
            if registry.items.contains_key(&item.id) {
                return Err(LibraryError::DuplicateItem { item_id: item.id });
            }
            registry.items.insert(item.id.clone(), item);
        }
        Ok(registry)
    }
}
