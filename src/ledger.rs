use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    calendar,
    error::{LibraryError, LibraryResult},
    loan::{Loan, overdue_fee},
    member::MemberRoster,
    registry::ItemRegistry,
    report::LoanReport,
};

/// Policy knobs applied when a loan is created
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct LoanRules {
    /// Leave Saturdays and Sundays out of the loan period
    pub skip_weekends: bool,
    /// Refuse new loans to members owing more than this
    pub balance_limit: Option<f64>,
}

/// Outcome of closing a loan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnReceipt {
    /// Returning member
    pub member_id: String,
    /// Returned item
    pub item_id: String,
    /// Date the loan was due
    pub due_on: NaiveDate,
    /// Date the item came back
    pub returned_on: NaiveDate,
    /// Days charged after grace
    pub overdue_days: u32,
    /// Fee charged for this return
    pub fee: f64,
    /// No overdue days were charged
    pub on_time: bool,
}

/// An open loan that is past due, with the fee accrued so far
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverdueNotice {
    /// Member holding the item
    pub member_id: String,
    /// Item that is overdue
    pub item_id: String,
    /// Date it was due
    pub due_on: NaiveDate,
    /// Days charged after grace
    pub overdue_days: u32,
    /// Fee the member would owe if it came back today
    pub fee_so_far: f64,
}

/// Creates and closes loans and keeps all of them as history
#[derive(Debug, Clone, Default)]
pub struct LoanLedger {
    /// Every loan, open and closed, in creation order
    loans: Vec<Loan>,
    /// Rules applied to new loans
    rules: LoanRules,
}

impl LoanLedger {
    /// Create an empty ledger
    #[must_use]
    pub fn new(rules: LoanRules) -> Self {
        Self { loans: Vec::new(), rules }
    }

    /// Rules applied to new loans
    #[must_use]
    pub fn rules(&self) -> LoanRules {
        self.rules
    }

    /// Replace the rules; existing loans keep their due dates
    pub fn set_rules(&mut self, rules: LoanRules) {
        self.rules = rules;
    }

    /// Lend a copy of `item_id` to `member_id`
    ///
    /// The loan period is fixed from the item's media kind at this moment.
    ///
    /// # Errors
    ///
    /// - `LibraryError::UnknownMember` / `LibraryError::UnknownItem` for unknown ids
    /// - `LibraryError::ItemUnavailable` if no copy is free
    /// - `LibraryError::DuplicateLoan` if the member already holds the item
    /// - `LibraryError::MemberInactive` if the member is inactive or over the balance limit
    /// - `LibraryError::DateOutOfRange` if the due date cannot be represented
    ///
    /// Nothing changes when an error is returned.
    pub fn borrow(
        &mut self,
        items: &mut ItemRegistry,
        members: &mut MemberRoster,
        member_id: &str,
        item_id: &str,
        today: NaiveDate,
    ) -> LibraryResult<Loan> {
        let member = members.get_mut(member_id)?;
        let item = items.get(item_id)?;

        if !item.is_available() {
            return Err(LibraryError::ItemUnavailable { item_id: item_id.to_string() });
        }
        if self.has_open_loan(member_id, item_id) {
            return Err(LibraryError::DuplicateLoan {
                member_id: member_id.to_string(),
                item_id: item_id.to_string(),
            });
        }
        member.check_eligibility(self.rules.balance_limit).map_err(|reason| {
            LibraryError::MemberInactive { member_id: member_id.to_string(), reason }
        })?;

        let loan_days = item.kind.loan_period_days();
        let due_on = calendar::due_date(today, loan_days, self.rules.skip_weekends)?;

        items.adjust_copies(item_id, -1)?;
        member.active_loans.insert(item_id.to_string());

        tracing::info!(member_id, item_id, %due_on, loan_days, "loan created");

        let loan = Loan {
            member_id: member_id.to_string(),
            item_id: item_id.to_string(),
            borrowed_on: today,
            loan_days,
            due_on,
            returned: false,
            returned_on: None,
        };
        self.loans.push(loan.clone());
        Ok(loan)
    }

    /// Close the member's open loan on `item_id` and charge any overdue fee
    ///
    /// Overdue days are the whole days past due minus `grace_days`, floored at
    /// zero. The fee is added to the member's balance.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::NoOpenLoan` if the member does not hold the item
    /// and `LibraryError::UnknownMember` for an unknown member. Nothing changes
    /// when an error is returned.
    #[allow(clippy::too_many_arguments)]
    pub fn return_item(
        &mut self,
        items: &mut ItemRegistry,
        members: &mut MemberRoster,
        member_id: &str,
        item_id: &str,
        today: NaiveDate,
        daily_fee: f64,
        grace_days: u32,
    ) -> LibraryResult<ReturnReceipt> {
        let member = members.get_mut(member_id)?;
        let loan = self
            .loans
            .iter_mut()
            .find(|loan| loan.is_open() && loan.concerns(member_id, item_id))
            .ok_or_else(|| LibraryError::NoOpenLoan {
                member_id: member_id.to_string(),
                item_id: item_id.to_string(),
            })?;

        let overdue_days = loan.overdue_days(today, grace_days);
        let fee = overdue_fee(overdue_days, daily_fee);

        items.adjust_copies(item_id, 1)?;
        loan.close(today);
        member.active_loans.remove(item_id);
        if fee > 0.0 {
            member.balance += fee;
        }

        tracing::info!(member_id, item_id, overdue_days, fee, "loan closed");

        Ok(ReturnReceipt {
            member_id: member_id.to_string(),
            item_id: item_id.to_string(),
            due_on: loan.due_on,
            returned_on: today,
            overdue_days,
            fee,
            on_time: overdue_days == 0,
        })
    }

    /// Whether `loan` is past due on `today`
    #[must_use]
    pub fn is_overdue(loan: &Loan, today: NaiveDate) -> bool {
        loan.is_overdue(today)
    }

    /// Summarize every loan as of `today`
    #[must_use]
    pub fn generate_report(&self, today: NaiveDate, fine_per_day: f64) -> LoanReport {
        LoanReport::build(&self.loans, today, fine_per_day)
    }

    /// Open loans that are overdue after grace, earliest due date first
    #[must_use]
    pub fn overdue_notices(
        &self,
        today: NaiveDate,
        daily_fee: f64,
        grace_days: u32,
    ) -> Vec<OverdueNotice> {
        let mut notices: Vec<OverdueNotice> = self
            .open_loans()
            .filter_map(|loan| {
                let overdue_days = loan.overdue_days(today, grace_days);
                (overdue_days > 0).then(|| OverdueNotice {
                    member_id: loan.member_id.clone(),
                    item_id: loan.item_id.clone(),
                    due_on: loan.due_on,
                    overdue_days,
                    fee_so_far: overdue_fee(overdue_days, daily_fee),
                })
            })
            .collect();

        notices.sort_by(|a, b| {
            (a.due_on, &a.member_id, &a.item_id).cmp(&(b.due_on, &b.member_id, &b.item_id))
        });
        notices
    }

    /// The open loan between a member and an item, if any
    #[must_use]
    pub fn open_loan(&self, member_id: &str, item_id: &str) -> Option<&Loan> {
        self.open_loans().find(|loan| loan.concerns(member_id, item_id))
    }

    /// Whether the member currently holds the item
    #[must_use]
    pub fn has_open_loan(&self, member_id: &str, item_id: &str) -> bool {
        self.open_loan(member_id, item_id).is_some()
    }

    /// Open loans in creation order
    pub fn open_loans(&self) -> impl Iterator<Item = &Loan> {
        self.loans.iter().filter(|loan| loan.is_open())
    }

    /// Number of copies of `item_id` currently out on loan
    #[must_use]
    pub fn open_loan_count(&self, item_id: &str) -> usize {
        self.open_loans().filter(|loan| loan.item_id == item_id).count()
    }

    /// Every item the member has ever borrowed
    #[must_use]
    pub fn borrowed_item_ids(&self, member_id: &str) -> BTreeSet<&str> {
        self.loans
            .iter()
            .filter(|loan| loan.member_id == member_id)
            .map(|loan| loan.item_id.as_str())
            .collect()
    }

    /// All loans in creation order
    #[must_use]
    pub fn loans(&self) -> &[Loan] {
        &self.loans
    }

    /// Rebuild a ledger from stored loans
    pub(crate) fn from_loans(loans: Vec<Loan>, rules: LoanRules) -> LibraryResult<Self> {
        let mut ledger = Self::new(rules);
        for loan in loans {
            if loan.returned != loan.returned_on.is_some() {
                return Err(LibraryError::InvalidSnapshot(format!(
                    "loan of {} to {} has inconsistent return state",
                    loan.item_id, loan.member_id
                )));
            }
            if loan.is_open() && ledger.has_open_loan(&loan.member_id, &loan.item_id) {
                return Err(LibraryError::InvalidSnapshot(format!(
                    "{} holds more than one open loan on {}",
                    loan.member_id, loan.item_id
                )));
            }
            ledger.loans.push(loan);
        }
        Ok(ledger)
    }
}

#[cfg(test)]
mod tests;
