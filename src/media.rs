use serde::{Deserialize, Serialize};

/// The kind of medium an item is, which decides how long it may be borrowed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaKind {
    /// A printed book on the shelf
    #[default]
    PhysicalBook,
    /// A licensed electronic book
    EBook,
    /// A DVD or other video disc
    Video,
}

impl MediaKind {
    /// Every kind the library circulates
    pub const ALL: [Self; 3] = [Self::PhysicalBook, Self::EBook, Self::Video];

    /// Standard loan length for this kind, in days
    #[must_use]
    pub const fn loan_period_days(self) -> u32 {
        match self {
            Self::PhysicalBook => 21,
            Self::EBook => 14,
            Self::Video => 7,
        }
    }

    /// Get a short human-readable label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PhysicalBook => "physical book",
            Self::EBook => "e-book",
            Self::Video => "video",
        }
    }
}
