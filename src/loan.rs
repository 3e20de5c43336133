use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifecycle position of a (member, item) loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum LoanState {
    /// The item is on loan
    Borrowed,
    /// The item came back on the given date
    Returned(NaiveDate),
}

/// A single loan; kept after return as history
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Loan {
    /// Borrowing member
    pub member_id: String,
    /// Borrowed item
    pub item_id: String,
    /// Day the loan started
    pub borrowed_on: NaiveDate,
    /// Loan length fixed when the loan was created
    pub loan_days: u32,
    /// Day the item is due back
    pub due_on: NaiveDate,
    /// Whether the item is back
    pub returned: bool,
    /// Day the item came back, if it has
    pub returned_on: Option<NaiveDate>,
}

impl Loan {
    /// Whether the loan is still open
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.returned
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> LoanState {
        match self.returned_on {
            Some(on) if self.returned => LoanState::Returned(on),
            _ => LoanState::Borrowed,
        }
    }

    /// Whether this loan is between `member_id` and `item_id`
    #[must_use]
    pub fn concerns(&self, member_id: &str, item_id: &str) -> bool {
        self.member_id == member_id && self.item_id == item_id
    }

    /// Whether the loan is past due on `today`
    #[must_use]
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        today > self.due_on
    }

    /// Whole days between the due date and `until`, floored at zero
    #[must_use]
    pub fn days_late(&self, until: NaiveDate) -> u32 {
        let days = until.signed_duration_since(self.due_on).num_days();
        u32::try_from(days.max(0)).unwrap_or(u32::MAX)
    }

    /// Days late once `grace_days` are forgiven
    #[must_use]
    pub fn overdue_days(&self, until: NaiveDate, grace_days: u32) -> u32 {
        self.days_late(until).saturating_sub(grace_days)
    }

    /// Close the loan
    pub(crate) fn close(&mut self, on: NaiveDate) {
        self.returned = true;
        self.returned_on = Some(on);
    }
}

/// Fee for a number of overdue days
#[must_use]
pub fn overdue_fee(overdue_days: u32, daily_fee: f64) -> f64 {
    f64::from(overdue_days) * daily_fee
}
