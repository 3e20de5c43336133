use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{LibraryError, LibraryResult};

/// Lowest accepted star rating
pub const MIN_RATING: u8 = 1;
/// Highest accepted star rating
pub const MAX_RATING: u8 = 5;

/// One member's rating of one item
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Rating {
    /// Rating member
    pub member_id: String,
    /// Rated item
    pub item_id: String,
    /// Stars, 1 to 5
    pub stars: u8,
}

/// What a call to [`RatingStore::rate`] changed
#[derive(Debug, Clone, PartialEq)]
pub struct RatingUpdate {
    /// The member's earlier rating, if this one replaced it
    pub previous: Option<u8>,
    /// Item average after the update
    pub average: f64,
    /// Number of members who have rated the item
    pub count: usize,
}

/// Latest rating per (member, item) with a cached average per item
#[derive(Debug, Clone, Default)]
pub struct RatingStore {
    /// item id -> member id -> stars
    ratings: BTreeMap<String, BTreeMap<String, u8>>,
    /// item id -> mean of its ratings
    averages: BTreeMap<String, f64>,
}

impl RatingStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rating, replacing any earlier one by the same member
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::InvalidRating` if `stars` is outside 1..=5
    pub fn rate(
        &mut self,
        member_id: &str,
        item_id: &str,
        stars: u8,
    ) -> LibraryResult<RatingUpdate> {
        if !(MIN_RATING..=MAX_RATING).contains(&stars) {
            return Err(LibraryError::InvalidRating { rating: stars });
        }

        let item_ratings = self.ratings.entry(item_id.to_string()).or_default();
        let previous = item_ratings.insert(member_id.to_string(), stars);
        let count = item_ratings.len();
        let average = mean(item_ratings.values().copied());
        self.averages.insert(item_id.to_string(), average);

        tracing::debug!(member_id, item_id, stars, average, "rating recorded");
        Ok(RatingUpdate { previous, average, count })
    }

    /// Mean rating of an item, 0.0 when nobody has rated it
    #[must_use]
    pub fn average(&self, item_id: &str) -> f64 {
        self.averages.get(item_id).copied().unwrap_or(0.0)
    }

    /// A member's rating of an item
    #[must_use]
    pub fn rating_of(&self, member_id: &str, item_id: &str) -> Option<u8> {
        self.ratings.get(item_id)?.get(member_id).copied()
    }

    /// Cached averages for every rated item
    #[must_use]
    pub fn average_ratings(&self) -> &BTreeMap<String, f64> {
        &self.averages
    }

    /// Every rating, ordered by item then member
    #[must_use]
    pub fn ratings(&self) -> Vec<Rating> {
        self.ratings
            .iter()
            .flat_map(|(item_id, by_member)| {
                by_member.iter().map(move |(member_id, stars)| Rating {
                    member_id: member_id.clone(),
                    item_id: item_id.clone(),
                    stars: *stars,
                })
            })
            .collect()
    }

    /// Rebuild a store from stored ratings, recomputing averages
    pub(crate) fn from_ratings(ratings: Vec<Rating>) -> LibraryResult<Self> {
        let mut store = Self::new();
        for rating in ratings {
            store.rate(&rating.member_id, &rating.item_id, rating.stars)?;
        }
        Ok(store)
    }
}

/// Arithmetic mean of star values, 0.0 for none
#[allow(clippy::cast_precision_loss, clippy::arithmetic_side_effects)]
fn mean(stars: impl Iterator<Item = u8>) -> f64 {
    let (sum, count) = stars.fold((0u64, 0u64), |(sum, count), s| (sum + u64::from(s), count + 1));
    if count == 0 { 0.0 } else { sum as f64 / count as f64 }
}
