use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Something that changed circulation state
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum LibraryEvent {
    /// A member took out a loan
    Borrowed {
        /// Borrowing member
        member_id: String,
        /// Borrowed item
        item_id: String,
        /// Day the loan is due back
        due_on: NaiveDate,
    },
    /// A loan was closed
    Returned {
        /// Returning member
        member_id: String,
        /// Returned item
        item_id: String,
        /// Fee charged
        fee: f64,
    },
    /// A member joined an item's queue
    Waitlisted {
        /// Waiting member
        member_id: String,
        /// Awaited item
        item_id: String,
        /// 1-based place in the queue
        position: usize,
    },
    /// A waiting member received a freed copy
    Promoted {
        /// Promoted member
        member_id: String,
        /// Item they now hold
        item_id: String,
    },
    /// A waiting member was dropped because they could not borrow
    PromotionSkipped {
        /// Dropped member
        member_id: String,
        /// Item they were waiting for
        item_id: String,
    },
    /// A member rated an item
    Rated {
        /// Rating member
        member_id: String,
        /// Rated item
        item_id: String,
        /// Stars given
        stars: u8,
        /// Item average afterwards
        average: f64,
    },
    /// The number of copies on the shelf was changed by hand
    CopiesAdjusted {
        /// Adjusted item
        item_id: String,
        /// Change applied
        delta: i64,
        /// Copies available afterwards
        available: u32,
    },
    /// A member paid toward their balance
    Paid {
        /// Paying member
        member_id: String,
        /// Amount paid
        amount: f64,
        /// Balance afterwards
        balance: f64,
    },
}

impl LibraryEvent {
    /// Member the event concerns, if any
    #[must_use]
    pub fn member_id(&self) -> Option<&str> {
        match self {
            Self::Borrowed { member_id, .. }
            | Self::Returned { member_id, .. }
            | Self::Waitlisted { member_id, .. }
            | Self::Promoted { member_id, .. }
            | Self::PromotionSkipped { member_id, .. }
            | Self::Rated { member_id, .. }
            | Self::Paid { member_id, .. } => Some(member_id.as_str()),
            Self::CopiesAdjusted { .. } => None,
        }
    }

    /// Item the event concerns, if any
    #[must_use]
    pub fn item_id(&self) -> Option<&str> {
        match self {
            Self::Borrowed { item_id, .. }
            | Self::Returned { item_id, .. }
            | Self::Waitlisted { item_id, .. }
            | Self::Promoted { item_id, .. }
            | Self::PromotionSkipped { item_id, .. }
            | Self::Rated { item_id, .. }
            | Self::CopiesAdjusted { item_id, .. } => Some(item_id.as_str()),
            Self::Paid { .. } => None,
        }
    }
}
