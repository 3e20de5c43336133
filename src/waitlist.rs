use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::{
    error::{LibraryError, LibraryResult},
    ledger::LoanLedger,
};

/// Stored form of one item's queue, front first
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WaitlistEntry {
    /// Item being waited for
    pub item_id: String,
    /// Waiting members in arrival order
    pub members: Vec<String>,
}

/// Result of trying to hand a freed copy to the queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromotionOutcome {
    /// Member who received the loan
    pub promoted: Option<String>,
    /// Members removed from the queue because their borrow failed
    pub dropped: Vec<String>,
}

/// Per-item FIFO queues of members waiting for a copy
#[derive(Debug, Clone, Default)]
pub struct Waitlist {
    /// Non-empty queues keyed by item id
    queues: BTreeMap<String, VecDeque<String>>,
}

impl Waitlist {
    /// Create an empty waitlist
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a member to an item's queue
    ///
    /// Returns the member's 1-based position.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::AlreadyHolding` if the member has the item on
    /// loan and `LibraryError::AlreadyWaitlisted` if they are already queued
    pub fn enqueue(
        &mut self,
        ledger: &LoanLedger,
        item_id: &str,
        member_id: &str,
    ) -> LibraryResult<usize> {
        if ledger.has_open_loan(member_id, item_id) {
            return Err(LibraryError::AlreadyHolding {
                member_id: member_id.to_string(),
                item_id: item_id.to_string(),
            });
        }
        if self.is_waiting(item_id, member_id) {
            return Err(LibraryError::AlreadyWaitlisted {
                member_id: member_id.to_string(),
                item_id: item_id.to_string(),
            });
        }

        let queue = self.queues.entry(item_id.to_string()).or_default();
        queue.push_back(member_id.to_string());
        let position = queue.len();

        tracing::info!(member_id, item_id, position, "member waitlisted");
        Ok(position)
    }

    /// Hand a freed copy to the first member in line who can take it.
    ///
    /// Members are popped from the front and offered the loan through
    /// `borrow`. A member whose borrow fails is dropped from the queue and
    /// the next one is tried. If the failure is about the item itself (no
    /// copy free, item unknown) the member keeps their place and promotion
    /// stops.
    pub fn promote<F>(&mut self, item_id: &str, mut borrow: F) -> PromotionOutcome
    where
        F: FnMut(&str) -> LibraryResult<()>,
    {
        let mut outcome = PromotionOutcome::default();
        let Some(queue) = self.queues.get_mut(item_id) else {
            return outcome;
        };

        while let Some(member_id) = queue.pop_front() {
            match borrow(&member_id) {
                Ok(()) => {
                    tracing::info!(member_id = %member_id, item_id, "waitlisted member promoted");
                    outcome.promoted = Some(member_id);
                    break;
                }
                Err(
                    err @ (LibraryError::ItemUnavailable { .. }
                    | LibraryError::UnknownItem { .. }),
                ) => {
                    tracing::debug!(
                        member_id = %member_id,
                        item_id,
                        error = %err,
                        "promotion deferred"
                    );
                    queue.push_front(member_id);
                    break;
                }
                Err(err) => {
                    tracing::warn!(
                        member_id = %member_id,
                        item_id,
                        error = %err,
                        "dropping member from waitlist"
                    );
                    outcome.dropped.push(member_id);
                }
            }
        }

        if queue.is_empty() {
            self.queues.remove(item_id);
        }
        outcome
    }

    /// Remove a member from an item's queue; returns whether they were in it
    pub fn withdraw(&mut self, item_id: &str, member_id: &str) -> bool {
        let Some(queue) = self.queues.get_mut(item_id) else {
            return false;
        };
        let before = queue.len();
        queue.retain(|waiting| waiting != member_id);
        let removed = queue.len() != before;

        if queue.is_empty() {
            self.queues.remove(item_id);
        }
        removed
    }

    /// 1-based place of a member in an item's queue
    #[must_use]
    pub fn position(&self, item_id: &str, member_id: &str) -> Option<usize> {
        self.queues
            .get(item_id)?
            .iter()
            .position(|waiting| waiting == member_id)
            .map(|index| index.saturating_add(1))
    }

    /// Whether a member is queued for an item
    #[must_use]
    pub fn is_waiting(&self, item_id: &str, member_id: &str) -> bool {
        self.position(item_id, member_id).is_some()
    }

    /// Members waiting for an item, front first
    #[must_use]
    pub fn queue(&self, item_id: &str) -> Vec<&str> {
        self.queues
            .get(item_id)
            .map(|queue| queue.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Number of members waiting for an item
    #[must_use]
    pub fn len(&self, item_id: &str) -> usize {
        self.queues.get(item_id).map_or(0, VecDeque::len)
    }

    /// Whether nobody waits for anything
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Every non-empty queue in item id order
    #[must_use]
    pub fn entries(&self) -> Vec<WaitlistEntry> {
        self.queues
            .iter()
            .map(|(item_id, queue)| WaitlistEntry {
                item_id: item_id.clone(),
                members: queue.iter().cloned().collect(),
            })
            .collect()
    }

    /// Rebuild queues, rejecting duplicates and members who hold the item
    pub(crate) fn from_entries(
        entries: Vec<WaitlistEntry>,
        ledger: &LoanLedger,
    ) -> LibraryResult<Self> {
        let mut waitlist = Self::new();
        for entry in entries {
            for member_id in &entry.members {
                waitlist
                    .enqueue(ledger, &entry.item_id, member_id)
                    .map_err(|err| LibraryError::InvalidSnapshot(err.to_string()))?;
            }
        }
        Ok(waitlist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_waitlist(members: &[&str]) -> Waitlist {
        let ledger = LoanLedger::default();
        let mut waitlist = Waitlist::new();
        for member in members {
            assert!(waitlist.enqueue(&ledger, "BK101", member).is_ok());
        }
        waitlist
    }

    #[test]
    fn enqueue_reports_position_and_rejects_duplicates() {
        let ledger = LoanLedger::default();
        let mut waitlist = Waitlist::new();

        assert_eq!(waitlist.enqueue(&ledger, "BK101", "M1").ok(), Some(1));
        assert_eq!(waitlist.enqueue(&ledger, "BK101", "M2").ok(), Some(2));
        assert!(matches!(
            waitlist.enqueue(&ledger, "BK101", "M1"),
            Err(LibraryError::AlreadyWaitlisted { .. })
        ));
        assert_eq!(waitlist.queue("BK101"), ["M1", "M2"]);
    }

    #[test]
    fn promote_takes_front_of_queue() {
        let mut waitlist = setup_waitlist(&["M1", "M2"]);

        let outcome = waitlist.promote("BK101", |_| Ok(()));
        assert_eq!(outcome.promoted.as_deref(), Some("M1"));
        assert!(outcome.dropped.is_empty());
        assert_eq!(waitlist.queue("BK101"), ["M2"]);
    }

    #[test]
    fn promote_skips_members_who_cannot_borrow() {
        let mut waitlist = setup_waitlist(&["M1", "M2", "M3"]);

        let outcome = waitlist.promote("BK101", |member_id| {
            if member_id == "M1" {
                Err(LibraryError::MemberInactive {
                    member_id: member_id.to_string(),
                    reason: crate::error::Ineligibility::Inactive,
                })
            } else {
                Ok(())
            }
        });

        assert_eq!(outcome.promoted.as_deref(), Some("M2"));
        assert_eq!(outcome.dropped, ["M1"]);
        assert_eq!(waitlist.queue("BK101"), ["M3"]);
    }

    #[test]
    fn promote_exhausts_queue_when_nobody_qualifies() {
        let mut waitlist = setup_waitlist(&["M1", "M2"]);

        let outcome = waitlist.promote("BK101", |member_id| {
            Err(LibraryError::UnknownMember { member_id: member_id.to_string() })
        });

        assert_eq!(outcome.promoted, None);
        assert_eq!(outcome.dropped.len(), 2);
        assert!(waitlist.is_empty());
    }

    #[test]
    fn promote_keeps_place_when_no_copy_is_free() {
        let mut waitlist = setup_waitlist(&["M1"]);

        let outcome = waitlist.promote("BK101", |_| {
            Err(LibraryError::ItemUnavailable { item_id: "BK101".to_string() })
        });

        assert_eq!(outcome, PromotionOutcome::default());
        assert_eq!(waitlist.position("BK101", "M1"), Some(1));
    }

    #[test]
    fn withdraw_removes_member() {
        let mut waitlist = setup_waitlist(&["M1", "M2"]);

        assert!(waitlist.withdraw("BK101", "M1"));
        assert!(!waitlist.withdraw("BK101", "M1"));
        assert_eq!(waitlist.position("BK101", "M2"), Some(1));
        assert_eq!(waitlist.len("BK101"), 1);
    }
}
