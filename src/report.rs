use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::loan::{Loan, overdue_fee};

/// Borrowing totals for a single member
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemberActivity {
    /// Loans ever taken out
    pub borrowed: usize,
    /// Loans that ran past their due date
    pub late: usize,
    /// Fines accrued across those loans
    pub fines: f64,
}

/// Aggregate view of the whole ledger as of a reference date.
///
/// Consumed by the export layer; fines are recomputed from the loans on every
/// call rather than read from stored balances.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoanReport {
    /// Date the report was computed for
    pub as_of: Option<NaiveDate>,
    /// Every loan ever created
    pub total_loans: usize,
    /// Loans not yet returned
    pub open_loans: usize,
    /// Open loans already past due
    pub overdue_loans: usize,
    /// Closed loans that came back after their due date
    pub late_returns: usize,
    /// Sum of fines across all loans
    pub total_fines: f64,
    /// Per-member breakdown
    pub member_activity: BTreeMap<String, MemberActivity>,
    /// Member with the most loans, smallest id on ties
    pub most_active_member: Option<String>,
    /// Item with the most loans, smallest id on ties
    pub most_borrowed_item: Option<String>,
}

impl LoanReport {
    /// Build a report over `loans`, charging `fine_per_day` for each late day
    #[allow(clippy::arithmetic_side_effects)]
    #[must_use]
    pub fn build(loans: &[Loan], today: NaiveDate, fine_per_day: f64) -> Self {
        let mut report = Self { as_of: Some(today), ..Self::default() };
        let mut item_counts: BTreeMap<&str, usize> = BTreeMap::new();

        for loan in loans {
            report.total_loans += 1;
            *item_counts.entry(loan.item_id.as_str()).or_default() += 1;

            let activity = report.member_activity.entry(loan.member_id.clone()).or_default();
            activity.borrowed += 1;

            let until = match loan.returned_on {
                Some(returned_on) if !loan.is_open() => returned_on,
                _ => today,
            };
            let days_late = loan.days_late(until);

            if loan.is_open() {
                report.open_loans += 1;
                if loan.is_overdue(today) {
                    report.overdue_loans += 1;
                }
            } else if days_late > 0 {
                report.late_returns += 1;
            }

            if days_late > 0 {
                let fine = overdue_fee(days_late, fine_per_day);
                activity.late += 1;
                activity.fines += fine;
                report.total_fines += fine;
            }
        }

        report.most_active_member =
            busiest(report.member_activity.iter().map(|(id, a)| (id.as_str(), a.borrowed)));
        report.most_borrowed_item = busiest(item_counts.into_iter());
        report
    }
}

/// Key with the highest count; iteration is in key order so the first
/// maximum seen is the smallest key
fn busiest<K: AsRef<str>>(counts: impl Iterator<Item = (K, usize)>) -> Option<String> {
    let mut best: Option<(K, usize)> = None;
    for (key, count) in counts {
        if best.as_ref().is_none_or(|(_, top)| count > *top) {
            best = Some((key, count));
        }
    }
    best.map(|(key, _)| key.as_ref().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busiest_prefers_smallest_key_on_ties() {
        let counts = BTreeMap::from([("M2", 3), ("M1", 3), ("M3", 1)]);
        assert_eq!(busiest(counts.into_iter()).as_deref(), Some("M1"));
        assert_eq!(busiest(std::iter::empty::<(String, usize)>()), None);
    }
}
