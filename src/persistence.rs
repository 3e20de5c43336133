use serde::{Deserialize, Serialize};

use crate::{
    error::LibraryResult,
    loan::Loan,
    member::Member,
    ratings::Rating,
    registry::Item,
    waitlist::WaitlistEntry,
};

/// Serializable representation of the whole circulation state.
///
/// Open and closed loans, queue order, and copy counts all survive a round
/// trip. Averages are not stored; they are recomputed from `ratings`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LibrarySnapshot {
    /// Catalog items with their current copy counts
    pub items: Vec<Item>,
    /// Member records including balances and held items
    pub members: Vec<Member>,
    /// Every loan in creation order
    pub loans: Vec<Loan>,
    /// Non-empty waitlists, each front first
    pub waitlists: Vec<WaitlistEntry>,
    /// Latest rating per (member, item)
    pub ratings: Vec<Rating>,
}

impl LibrarySnapshot {
    /// Encode as pretty-printed JSON
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Snapshot` if serialization fails
    pub fn to_json(&self) -> LibraryResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode from JSON
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Snapshot` if the text is not a valid snapshot
    pub fn from_json(json: &str) -> LibraryResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
