use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a member is not allowed to take out a new loan
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum Ineligibility {
    /// The member account is switched off
    Inactive,
    /// Outstanding fees exceed the configured limit
    BalanceOverLimit {
        /// Fees currently owed
        balance: f64,
        /// Highest balance that still allows borrowing
        limit: f64,
    },
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inactive => write!(f, "account is inactive"),
            Self::BalanceOverLimit { balance, limit } => {
                write!(f, "balance {balance:.2} exceeds limit {limit:.2}")
            }
        }
    }
}

/// Errors produced by circulation operations.
///
/// Each error is fatal to the requested operation only; no operation applies
/// a partial mutation before returning one of these.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// An item with this id is already registered
    #[error("item {item_id} is already registered")]
    DuplicateItem {
        /// Offending item id
        item_id: String,
    },
    /// No item with this id exists
    #[error("item {item_id} is not in the catalog")]
    UnknownItem {
        /// Requested item id
        item_id: String,
    },
    /// A member with this id is already on the roster
    #[error("member {member_id} is already registered")]
    DuplicateMember {
        /// Offending member id
        member_id: String,
    },
    /// No member with this id exists
    #[error("member {member_id} is not registered")]
    UnknownMember {
        /// Requested member id
        member_id: String,
    },
    /// A copy adjustment would leave the available count out of range
    #[error("cannot adjust copies of {item_id} by {delta}: {available} of {total} available")]
    InvalidAdjustment {
        /// Item being adjusted
        item_id: String,
        /// Requested change
        delta: i64,
        /// Copies available before the change
        available: u32,
        /// Total copies owned
        total: u32,
    },
    /// Every copy is out on loan
    #[error("no copies of {item_id} are available")]
    ItemUnavailable {
        /// Requested item id
        item_id: String,
    },
    /// The member already holds an open loan on this item
    #[error("member {member_id} already has {item_id} on loan")]
    DuplicateLoan {
        /// Borrowing member
        member_id: String,
        /// Requested item
        item_id: String,
    },
    /// The member may not borrow right now
    #[error("member {member_id} cannot borrow: {reason}")]
    MemberInactive {
        /// Rejected member
        member_id: String,
        /// Policy that rejected the request
        reason: Ineligibility,
    },
    /// There is no open loan to close
    #[error("member {member_id} has no open loan on {item_id}")]
    NoOpenLoan {
        /// Returning member
        member_id: String,
        /// Returned item
        item_id: String,
    },
    /// The member is already queued for this item
    #[error("member {member_id} is already waitlisted for {item_id}")]
    AlreadyWaitlisted {
        /// Queued member
        member_id: String,
        /// Item being waited for
        item_id: String,
    },
    /// The member holds the item and cannot also wait for it
    #[error("member {member_id} already holds {item_id}")]
    AlreadyHolding {
        /// Holding member
        member_id: String,
        /// Held item
        item_id: String,
    },
    /// Ratings must be between 1 and 5 stars
    #[error("rating {rating} is outside 1..=5")]
    InvalidRating {
        /// Rejected rating
        rating: u8,
    },
    /// Payments must be finite and positive
    #[error("payment amount {amount} is not a positive number")]
    InvalidPayment {
        /// Rejected amount
        amount: f64,
    },
    /// Date arithmetic ran off the end of the calendar
    #[error("cannot add {days} days to {from}")]
    DateOutOfRange {
        /// Starting date
        from: NaiveDate,
        /// Days that were being added
        days: u32,
    },
    /// Snapshot could not be encoded or decoded
    #[error("snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
    /// Snapshot decoded but describes an impossible state
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
    /// Policy configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Result alias used throughout the crate
pub type LibraryResult<T> = Result<T, LibraryError>;
