//! Circulation core for a small library.
//!
//! This crate tracks items, members and loans: borrowing and returning,
//! overdue fees, per-item waitlists with automatic promotion when a copy
//! comes back, ratings, and personalized recommendations. [`Library`] owns
//! every component and is the entry point for composite operations such as
//! [`Library::reserve_or_wait`].

pub mod calendar;
pub mod error;
pub mod events;
pub mod ledger;
pub mod library;
pub mod loan;
pub mod media;
pub mod member;
pub mod observers;
pub mod persistence;
pub mod policy;
pub mod ratings;
pub mod recommend;
pub mod registry;
pub mod report;
pub mod waitlist;

pub use error::{Ineligibility, LibraryError, LibraryResult};
pub use events::LibraryEvent;
pub use ledger::{LoanLedger, LoanRules, OverdueNotice, ReturnReceipt};
pub use library::{Library, Reservation, ReturnOutcome};
pub use loan::{Loan, LoanState};
pub use media::MediaKind;
pub use member::{Member, MemberRoster};
pub use observers::{EventLogger, LibraryObserver};
pub use persistence::LibrarySnapshot;
pub use policy::LibraryPolicy;
pub use ratings::{Rating, RatingStore, RatingUpdate};
pub use recommend::{Recommendation, RecommendationEngine, ScoreWeights};
pub use registry::{CatalogQuery, Item, ItemRegistry};
pub use report::{LoanReport, MemberActivity};
pub use waitlist::{PromotionOutcome, Waitlist, WaitlistEntry};
