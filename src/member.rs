use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Ineligibility, LibraryError, LibraryResult};

/// A library member and the loans they currently hold
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Member {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Tags the member says they enjoy
    #[serde(default)]
    pub preference_tags: BTreeSet<String>,
    /// Authors the member says they enjoy
    #[serde(default)]
    pub preference_authors: BTreeSet<String>,
    /// Inactive members cannot borrow
    pub active: bool,
    /// Unpaid overdue fees
    #[serde(default)]
    pub balance: f64,
    /// Ids of items the member currently has on loan
    #[serde(default)]
    pub active_loans: BTreeSet<String>,
}

impl Member {
    /// Create an active member with no preferences, loans, or balance
    #[must_use]
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            preference_tags: BTreeSet::new(),
            preference_authors: BTreeSet::new(),
            active: true,
            balance: 0.0,
            active_loans: BTreeSet::new(),
        }
    }

    /// Replace the preferred tags
    #[must_use]
    pub fn with_preference_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preference_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the preferred authors
    #[must_use]
    pub fn with_preference_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preference_authors = authors.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the member has stated any preference at all
    #[must_use]
    pub fn has_preferences(&self) -> bool {
        !self.preference_tags.is_empty() || !self.preference_authors.is_empty()
    }

    /// Whether the member currently holds `item_id`
    #[must_use]
    pub fn holds(&self, item_id: &str) -> bool {
        self.active_loans.contains(item_id)
    }

    /// Check the member against the borrowing policy
    ///
    /// # Errors
    ///
    /// Returns the reason the member may not borrow
    pub fn check_eligibility(&self, balance_limit: Option<f64>) -> Result<(), Ineligibility> {
        if !self.active {
            return Err(Ineligibility::Inactive);
        }
        match balance_limit {
            Some(limit) if self.balance > limit => {
                Err(Ineligibility::BalanceOverLimit { balance: self.balance, limit })
            }
            _ => Ok(()),
        }
    }
}

/// The member records the circulation core reads and updates
#[derive(Debug, Clone, Default)]
pub struct MemberRoster {
    /// Members ordered by id
    members: BTreeMap<String, Member>,
}

impl MemberRoster {
    /// Create an empty roster
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::DuplicateMember` if the id is taken
    pub fn add(&mut self, member: Member) -> LibraryResult<&Member> {
        if self.members.contains_key(&member.id) {
            return Err(LibraryError::DuplicateMember { member_id: member.id });
        }
        let id = member.id.clone();
        Ok(self.members.entry(id).or_insert(member))
    }

    /// Look up a member
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::UnknownMember` if no member has this id
    pub fn get(&self, member_id: &str) -> LibraryResult<&Member> {
        self.members
            .get(member_id)
            .ok_or_else(|| LibraryError::UnknownMember { member_id: member_id.to_string() })
    }

    /// Mutable lookup for the ledger
    pub(crate) fn get_mut(&mut self, member_id: &str) -> LibraryResult<&mut Member> {
        self.members
            .get_mut(member_id)
            .ok_or_else(|| LibraryError::UnknownMember { member_id: member_id.to_string() })
    }

    /// Switch a member's account on or off
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::UnknownMember` if no member has this id
    pub fn set_active(&mut self, member_id: &str, active: bool) -> LibraryResult<()> {
        let member = self.get_mut(member_id)?;
        member.active = active;
        tracing::info!(member_id, active, "member activity changed");
        Ok(())
    }

    /// Pay down a member's balance, never below zero
    ///
    /// Returns the remaining balance.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::InvalidPayment` for a non-finite or non-positive
    /// amount and `LibraryError::UnknownMember` for an unknown id
    pub fn pay(&mut self, member_id: &str, amount: f64) -> LibraryResult<f64> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(LibraryError::InvalidPayment { amount });
        }
        let member = self.get_mut(member_id)?;
        member.balance = (member.balance - amount).max(0.0);
        tracing::info!(member_id, amount, balance = member.balance, "payment received");
        Ok(member.balance)
    }

    /// Count members, optionally only the active ones
    #[must_use]
    pub fn count(&self, active_only: bool) -> usize {
        self.members.values().filter(|m| !active_only || m.active).count()
    }

    /// All members in id order
    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    /// Rebuild a roster from stored members
    pub(crate) fn from_members(members: Vec<Member>) -> LibraryResult<Self> {
        let mut roster = Self::new();
        for member in members {
            roster.add(member)?;
        }
        Ok(roster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_reduces_balance_and_floors_at_zero() {
        let mut roster = MemberRoster::new();
        let mut member = Member::new("M1", "Ada");
        member.balance = 3.0;
        assert!(roster.add(member).is_ok());

        assert_eq!(roster.pay("M1", 1.0).ok(), Some(2.0));
        assert_eq!(roster.pay("M1", 10.0).ok(), Some(0.0));
    }

    #[test]
    fn payment_must_be_positive() {
        let mut roster = MemberRoster::new();
        assert!(roster.add(Member::new("M1", "Ada")).is_ok());

        assert!(matches!(roster.pay("M1", 0.0), Err(LibraryError::InvalidPayment { .. })));
        assert!(matches!(roster.pay("M1", f64::NAN), Err(LibraryError::InvalidPayment { .. })));
    }

    #[test]
    fn eligibility_respects_activity_and_limit() {
        let mut member = Member::new("M1", "Ada");
        assert!(member.check_eligibility(None).is_ok());

        member.balance = 5.0;
        assert!(member.check_eligibility(Some(5.0)).is_ok());
        assert!(matches!(
            member.check_eligibility(Some(4.0)),
            Err(Ineligibility::BalanceOverLimit { .. })
        ));

        member.active = false;
        assert_eq!(member.check_eligibility(None), Err(Ineligibility::Inactive));
    }

    #[test]
    fn count_filters_inactive_members() {
        let mut roster = MemberRoster::new();
        assert!(roster.add(Member::new("M1", "Ada")).is_ok());
        assert!(roster.add(Member::new("M2", "Grace")).is_ok());
        assert!(roster.set_active("M2", false).is_ok());

        assert_eq!(roster.count(true), 1);
        assert_eq!(roster.count(false), 2);
        assert!(matches!(
            roster.add(Member::new("M1", "Dup")),
            Err(LibraryError::DuplicateMember { .. })
        ));
    }
}
