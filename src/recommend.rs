//! Personalized recommendations from tag, author, rating and history signals.
//!
//! Each candidate a member has never borrowed is scored as
//!
//! ```text
//! tags    * |item.tags ∩ member.preference_tags| / max(1, |item.tags|)
//! author  * (1 if item.author is a preferred author else 0)
//! rating  * average_rating / 5
//! history * fraction of the member's past items sharing a tag with it
//! ```
//!
//! Ranking is by score, then average rating, then item id, so identical
//! inputs always give the same list. Members with no preferences and no
//! history get the best-rated items instead.

use std::{cmp::Ordering, collections::BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    ledger::LoanLedger,
    member::Member,
    ratings::{MAX_RATING, RatingStore},
    registry::{Item, ItemRegistry},
};

/// Weight of each recommendation signal
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Preferred-tag overlap
    pub tags: f64,
    /// Preferred author match
    pub author: f64,
    /// Average rating
    pub rating: f64,
    /// Tag overlap with borrowing history
    pub history: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            tags: 0.25,
            author: 0.25,
            rating: 0.25,
            history: 0.25,
        }
    }
}

impl ScoreWeights {
    /// Check every weight is a finite, non-negative number
    ///
    /// # Errors
    ///
    /// Returns the name of the first offending weight
    pub fn validate(&self) -> Result<(), String> {
        let named = [
            ("tags", self.tags),
            ("author", self.author),
            ("rating", self.rating),
            ("history", self.history),
        ];
        match named.iter().find(|(_, w)| !w.is_finite() || *w < 0.0) {
            Some((name, weight)) => Err(format!(
                "weight {name} = {weight} must be finite and non-negative"
            )),
            None => Ok(()),
        }
    }
}

/// A recommended item and its score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    /// Recommended item
    pub item_id: String,
    /// Weighted score, higher is better
    pub score: f64,
}

/// Internal ranking row
#[derive(Debug)]
struct Scored<'a> {
    /// Candidate item
    item: &'a Item,
    /// Weighted score
    score: f64,
    /// Average rating, the first tie-breaker
    average: f64,
}

impl Scored<'_> {
    /// Highest score first, then highest average, then smallest id
    fn rank(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.average.total_cmp(&self.average))
            .then_with(|| self.item.id.cmp(&other.item.id))
    }
}

/// Read-only scorer over the catalog, ledger and ratings
#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendationEngine {
    /// Signal weights
    weights: ScoreWeights,
}

impl RecommendationEngine {
    /// Create an engine with the given weights
    #[must_use]
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    /// Weights in use
    #[must_use]
    pub fn weights(&self) -> ScoreWeights {
        self.weights
    }

    /// Up to `limit` items for `member`, best first
    #[must_use]
    pub fn recommend(
        &self,
        member: &Member,
        items: &ItemRegistry,
        ledger: &LoanLedger,
        ratings: &RatingStore,
        limit: usize,
    ) -> Vec<Recommendation> {
        let history = ledger.borrowed_item_ids(&member.id);

        let mut scored: Vec<Scored<'_>> = if history.is_empty() && !member.has_preferences() {
            Self::popular(items, ratings)
        } else {
            self.personalized(member, items, ratings, &history)
        };

        scored.sort_by(|a, b| a.rank(b));
        scored
            .into_iter()
            .take(limit)
            .map(|row| Recommendation { item_id: row.item.id.clone(), score: row.score })
            .collect()
    }

    /// Cold-start fallback: every rated item
    fn popular<'a>(items: &'a ItemRegistry, ratings: &RatingStore) -> Vec<Scored<'a>> {
        items
            .iter()
            .filter(|item| ratings.average_ratings().contains_key(&item.id))
            .map(|item| {
                let average = ratings.average(&item.id);
                Scored { item, score: average / f64::from(MAX_RATING), average }
            })
            .collect()
    }

    /// Score every never-borrowed item, dropping those that score nothing
    fn personalized<'a>(
        &self,
        member: &Member,
        items: &'a ItemRegistry,
        ratings: &RatingStore,
        history: &BTreeSet<&str>,
    ) -> Vec<Scored<'a>> {
        let past: Vec<&Item> = history.iter().filter_map(|id| items.get(id).ok()).collect();

        items
            .iter()
            .filter(|item| !history.contains(item.id.as_str()))
            .map(|item| {
                let average = ratings.average(&item.id);
                Scored { item, score: self.score(item, member, &past, average), average }
            })
            .filter(|row| row.score > 0.0)
            .collect()
    }

    /// Weighted sum of the four signals for one candidate
    #[allow(clippy::cast_precision_loss)]
    fn score(&self, item: &Item, member: &Member, past: &[&Item], average: f64) -> f64 {
        let tag_overlap =
            item.shared_tags(&member.preference_tags) as f64 / item.tags.len().max(1) as f64;
        let author_match = if member.preference_authors.contains(&item.author) { 1.0 } else { 0.0 };
        let rating = average / f64::from(MAX_RATING);
        let co_borrow = if past.is_empty() {
            0.0
        } else {
            let sharing = past.iter().filter(|p| !p.tags.is_disjoint(&item.tags)).count();
            sharing as f64 / past.len() as f64
        };

        self.weights.tags * tag_overlap
            + self.weights.author * author_match
            + self.weights.rating * rating
            + self.weights.history * co_borrow
    }
}
