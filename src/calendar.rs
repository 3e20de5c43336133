//! Due-date arithmetic.

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::error::{LibraryError, LibraryResult};

/// Whether a date falls on Saturday or Sunday
#[must_use]
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Compute the due date `loan_days` after `borrowed_on`.
///
/// With `skip_weekends`, Saturdays and Sundays do not count toward the loan
/// period, so every weekend day crossed pushes the due date out by one day
/// and the result always lands on a weekday.
///
/// # Errors
///
/// Returns `LibraryError::DateOutOfRange` if the result is past the end of
/// the supported calendar
#[allow(clippy::arithmetic_side_effects)]
pub fn due_date(
    borrowed_on: NaiveDate,
    loan_days: u32,
    skip_weekends: bool,
) -> LibraryResult<NaiveDate> {
    let out_of_range = || LibraryError::DateOutOfRange { from: borrowed_on, days: loan_days };

    if !skip_weekends {
        return borrowed_on
            .checked_add_days(Days::new(u64::from(loan_days)))
            .ok_or_else(out_of_range);
    }

    let mut due = borrowed_on;
    let mut counted = 0;
    while counted < loan_days {
        due = due.succ_opt().ok_or_else(out_of_range)?;
        if !is_weekend(due) {
            counted += 1;
        }
    }
    Ok(due)
}
