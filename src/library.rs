use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    fmt,
};

use chrono::NaiveDate;

use crate::{
    error::{LibraryError, LibraryResult},
    events::LibraryEvent,
    ledger::{LoanLedger, OverdueNotice, ReturnReceipt},
    loan::Loan,
    member::{Member, MemberRoster},
    observers::{EventLogger, LibraryObserver},
    persistence::LibrarySnapshot,
    policy::LibraryPolicy,
    ratings::{RatingStore, RatingUpdate},
    recommend::{Recommendation, RecommendationEngine},
    registry::{CatalogQuery, Item, ItemRegistry},
    report::LoanReport,
    waitlist::Waitlist,
};

/// What `reserve_or_wait` did for the caller
#[derive(Debug, Clone, PartialEq)]
pub enum Reservation {
    /// A copy was free and is now on loan to the member
    Borrowed(Loan),
    /// No copy was free; the member is queued at this 1-based position
    Waitlisted {
        /// Place in the queue
        position: usize,
    },
}

/// A closed loan and whoever received the freed copy
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnOutcome {
    /// Fee and lateness of the returned loan
    pub receipt: ReturnReceipt,
    /// Waiting member who now holds the copy
    pub promoted: Option<String>,
}

/// The circulation desk: owns every component and runs the composite
/// operations that span them
pub struct Library {
    /// Catalog and copy counts
    items: ItemRegistry,
    /// Member records
    members: MemberRoster,
    /// Open and closed loans
    ledger: LoanLedger,
    /// Per-item queues
    waitlist: Waitlist,
    /// Ratings and averages
    ratings: RatingStore,
    /// Recommendation scorer
    engine: RecommendationEngine,
    /// Fee, grace and loan policy
    policy: LibraryPolicy,
    /// Most recent events, oldest first
    journal: VecDeque<LibraryEvent>,
    /// Registered event observers
    observers: Vec<Box<dyn LibraryObserver>>,
}

// Manual implementation of Debug for Library
impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("items", &self.items)
            .field("members", &self.members)
            .field("ledger", &self.ledger)
            .field("waitlist", &self.waitlist)
            .field("ratings", &self.ratings)
            .field("engine", &self.engine)
            .field("policy", &self.policy)
            .field("journal", &self.journal)
            .field("observers_count", &self.observers.len())
            .finish()
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new(LibraryPolicy::default())
    }
}

impl Library {
    /// Create an empty library governed by `policy`
    #[must_use]
    pub fn new(policy: LibraryPolicy) -> Self {
        Self::from_parts(
            ItemRegistry::new(),
            MemberRoster::new(),
            LoanLedger::new(policy.loan_rules()),
            Waitlist::new(),
            RatingStore::new(),
            policy,
        )
    }

    /// Assemble a library around existing components
    fn from_parts(
        items: ItemRegistry,
        members: MemberRoster,
        ledger: LoanLedger,
        waitlist: Waitlist,
        ratings: RatingStore,
        policy: LibraryPolicy,
    ) -> Self {
        let mut library = Self {
            items,
            members,
            ledger,
            waitlist,
            ratings,
            engine: RecommendationEngine::new(policy.weights),
            policy,
            journal: VecDeque::new(),
            observers: Vec::new(),
        };
        library.register_observer(Box::new(EventLogger));
        library
    }

    /// Register an observer to be notified of every event
    pub fn register_observer(&mut self, observer: Box<dyn LibraryObserver>) {
        self.observers.push(observer);
    }

    /// Add an item to the catalog
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::DuplicateItem` if the id is taken
    pub fn register_item(&mut self, item: Item) -> LibraryResult<()> {
        self.items.register(item)?;
        Ok(())
    }

    /// Add a member to the roster
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::DuplicateMember` if the id is taken
    pub fn add_member(&mut self, member: Member) -> LibraryResult<()> {
        self.members.add(member)?;
        Ok(())
    }

    /// Switch a member's account on or off
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::UnknownMember` for an unknown id
    pub fn set_member_active(&mut self, member_id: &str, active: bool) -> LibraryResult<()> {
        self.members.set_active(member_id, active)
    }

    /// Pay toward a member's balance; returns what is still owed
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::InvalidPayment` or `LibraryError::UnknownMember`
    pub fn pay(&mut self, member_id: &str, amount: f64) -> LibraryResult<f64> {
        let balance = self.members.pay(member_id, amount)?;
        self.emit(LibraryEvent::Paid {
            member_id: member_id.to_string(),
            amount,
            balance,
        });
        Ok(balance)
    }

    /// Borrow a free copy, or join the queue when none is free.
    ///
    /// Any queue for the item is served first if copies are free, so the
    /// caller never jumps ahead of members already waiting.
    ///
    /// # Errors
    ///
    /// - `LibraryError::UnknownMember` / `LibraryError::UnknownItem` for unknown ids
    /// - `LibraryError::DuplicateLoan` if the member holds the item and a copy is free
    /// - `LibraryError::AlreadyHolding` if the member holds the item and none is free
    /// - `LibraryError::AlreadyWaitlisted` if the member is already queued
    /// - `LibraryError::MemberInactive` if a copy is free but the member may not borrow
    pub fn reserve_or_wait(
        &mut self,
        member_id: &str,
        item_id: &str,
        today: NaiveDate,
    ) -> LibraryResult<Reservation> {
        self.members.get(member_id)?;
        self.items.get(item_id)?;

        let held_before = self.ledger.has_open_loan(member_id, item_id);
        self.drain_waitlist(item_id, today);
        // Already queued and served by the drain above
        if let Some(loan) = self.ledger.open_loan(member_id, item_id).filter(|_| !held_before) {
            return Ok(Reservation::Borrowed(loan.clone()));
        }

        if self.waitlist.is_waiting(item_id, member_id) {
            return Err(LibraryError::AlreadyWaitlisted {
                member_id: member_id.to_string(),
                item_id: item_id.to_string(),
            });
        }

        match self.ledger.borrow(&mut self.items, &mut self.members, member_id, item_id, today) {
            Ok(loan) => {
                self.emit(LibraryEvent::Borrowed {
                    member_id: member_id.to_string(),
                    item_id: item_id.to_string(),
                    due_on: loan.due_on,
                });
                Ok(Reservation::Borrowed(loan))
            }
            Err(LibraryError::ItemUnavailable { .. }) => {
                let position = self.waitlist.enqueue(&self.ledger, item_id, member_id)?;
                self.emit(LibraryEvent::Waitlisted {
                    member_id: member_id.to_string(),
                    item_id: item_id.to_string(),
                    position,
                });
                Ok(Reservation::Waitlisted { position })
            }
            Err(err) => Err(err),
        }
    }

    /// Return an item using the policy's fee and grace period, then hand the
    /// copy to the waitlist
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::NoOpenLoan` if the member does not hold the item
    pub fn return_item(
        &mut self,
        member_id: &str,
        item_id: &str,
        today: NaiveDate,
    ) -> LibraryResult<ReturnOutcome> {
        let (daily_fee, grace_days) = (self.policy.daily_fee, self.policy.grace_days);
        self.return_item_with(member_id, item_id, today, daily_fee, grace_days)
    }

    /// Return an item with an explicit fee and grace period, then hand the
    /// copy to the waitlist
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::NoOpenLoan` if the member does not hold the item
    pub fn return_item_with(
        &mut self,
        member_id: &str,
        item_id: &str,
        today: NaiveDate,
        daily_fee: f64,
        grace_days: u32,
    ) -> LibraryResult<ReturnOutcome> {
        let receipt = self.ledger.return_item(
            &mut self.items,
            &mut self.members,
            member_id,
            item_id,
            today,
            daily_fee,
            grace_days,
        )?;
        self.emit(LibraryEvent::Returned {
            member_id: member_id.to_string(),
            item_id: item_id.to_string(),
            fee: receipt.fee,
        });

        let promoted = self.drain_waitlist(item_id, today);
        Ok(ReturnOutcome { receipt, promoted })
    }

    /// Offer a free copy of `item_id` to the front of its queue.
    ///
    /// Members whose borrow fails are dropped and logged; the next in line is
    /// tried until one succeeds or the queue runs out.
    pub fn promote(&mut self, item_id: &str, today: NaiveDate) -> Option<String> {
        let Self { items, members, ledger, waitlist, .. } = self;
        let outcome = waitlist.promote(item_id, |member_id| {
            ledger.borrow(items, members, member_id, item_id, today).map(|_| ())
        });

        for member_id in outcome.dropped {
            self.emit(LibraryEvent::PromotionSkipped {
                member_id,
                item_id: item_id.to_string(),
            });
        }
        if let Some(member_id) = &outcome.promoted {
            self.emit(LibraryEvent::Promoted {
                member_id: member_id.clone(),
                item_id: item_id.to_string(),
            });
        }
        outcome.promoted
    }

    /// Promote until no copy is free or nobody is waiting; returns the first
    /// member promoted
    fn drain_waitlist(&mut self, item_id: &str, today: NaiveDate) -> Option<String> {
        let mut first = None;
        while self.items.get(item_id).is_ok_and(Item::is_available)
            && self.waitlist.len(item_id) > 0
        {
            let Some(member_id) = self.promote(item_id, today) else {
                break;
            };
            if first.is_none() {
                first = Some(member_id);
            }
        }
        first
    }

    /// Change the copies on the shelf by hand, serving the queue when
    /// copies are added
    ///
    /// Copies out on loan still count against the total, so an addition may
    /// only fill the room those loans leave.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::InvalidAdjustment` or `LibraryError::UnknownItem`
    pub fn adjust_copies(
        &mut self,
        item_id: &str,
        delta: i64,
        today: NaiveDate,
    ) -> LibraryResult<u32> {
        let item = self.items.get(item_id)?;
        let on_loan = u32::try_from(self.ledger.open_loan_count(item_id)).unwrap_or(u32::MAX);
        let room = item
            .copies_total
            .saturating_sub(on_loan)
            .saturating_sub(item.copies_available);
        if delta > i64::from(room) {
            return Err(LibraryError::InvalidAdjustment {
                item_id: item_id.to_string(),
                delta,
                available: item.copies_available,
                total: item.copies_total,
            });
        }

        let available = self.items.adjust_copies(item_id, delta)?;
        self.emit(LibraryEvent::CopiesAdjusted {
            item_id: item_id.to_string(),
            delta,
            available,
        });

        if delta > 0 {
            self.drain_waitlist(item_id, today);
        }
        self.items.get(item_id).map(|item| item.copies_available)
    }

    /// Rate an item on behalf of a member
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::InvalidRating` for stars outside 1..=5 and
    /// `LibraryError::UnknownMember` / `LibraryError::UnknownItem` for unknown ids
    pub fn rate(
        &mut self,
        member_id: &str,
        item_id: &str,
        stars: u8,
    ) -> LibraryResult<RatingUpdate> {
        self.members.get(member_id)?;
        self.items.get(item_id)?;

        let update = self.ratings.rate(member_id, item_id, stars)?;
        self.emit(LibraryEvent::Rated {
            member_id: member_id.to_string(),
            item_id: item_id.to_string(),
            stars,
            average: update.average,
        });
        Ok(update)
    }

    /// Recommend up to `limit` items the member has never borrowed
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::UnknownMember` for an unknown id
    pub fn recommend(&self, member_id: &str, limit: usize) -> LibraryResult<Vec<Recommendation>> {
        let member = self.members.get(member_id)?;
        Ok(self.engine.recommend(member, &self.items, &self.ledger, &self.ratings, limit))
    }

    /// Summarize the ledger as of `today`
    #[must_use]
    pub fn generate_report(&self, today: NaiveDate, fine_per_day: f64) -> LoanReport {
        self.ledger.generate_report(today, fine_per_day)
    }

    /// Overdue open loans as of `today` under the current policy
    #[must_use]
    pub fn overdue_notices(&self, today: NaiveDate) -> Vec<OverdueNotice> {
        self.ledger.overdue_notices(today, self.policy.daily_fee, self.policy.grace_days)
    }

    /// Search the catalog
    #[must_use]
    pub fn search(&self, query: &CatalogQuery) -> Vec<&Item> {
        self.items.search(query)
    }

    /// Catalog
    #[must_use]
    pub fn items(&self) -> &ItemRegistry {
        &self.items
    }

    /// Member roster
    #[must_use]
    pub fn members(&self) -> &MemberRoster {
        &self.members
    }

    /// Loan ledger
    #[must_use]
    pub fn ledger(&self) -> &LoanLedger {
        &self.ledger
    }

    /// Waitlists
    #[must_use]
    pub fn waitlist(&self) -> &Waitlist {
        &self.waitlist
    }

    /// Ratings
    #[must_use]
    pub fn ratings(&self) -> &RatingStore {
        &self.ratings
    }

    /// Policy in force
    #[must_use]
    pub fn policy(&self) -> &LibraryPolicy {
        &self.policy
    }

    /// Recent events, oldest first
    pub fn events(&self) -> impl Iterator<Item = &LibraryEvent> {
        self.journal.iter()
    }

    /// Record an event and notify observers
    fn emit(&mut self, event: LibraryEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }

        self.journal.push_back(event);
        while self.journal.len() > self.policy.max_events {
            drop(self.journal.pop_front());
        }
    }

    /// Capture the full circulation state
    #[must_use]
    pub fn snapshot(&self) -> LibrarySnapshot {
        LibrarySnapshot {
            items: self.items.iter().cloned().collect(),
            members: self.members.iter().cloned().collect(),
            loans: self.ledger.loans().to_vec(),
            waitlists: self.waitlist.entries(),
            ratings: self.ratings.ratings(),
        }
    }

    /// Rebuild a library from a snapshot
    ///
    /// Observers other than the default logger need to be re-attached.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::InvalidSnapshot` if the snapshot breaks a
    /// circulation invariant, or `LibraryError::Config` for an invalid policy
    pub fn restore(snapshot: LibrarySnapshot, policy: LibraryPolicy) -> LibraryResult<Self> {
        policy.validate()?;

        let items = ItemRegistry::from_items(snapshot.items)?;
        let members = MemberRoster::from_members(snapshot.members)?;
        let ledger = LoanLedger::from_loans(snapshot.loans, policy.loan_rules())?;
        check_loans(&items, &members, &ledger)?;

        for entry in &snapshot.waitlists {
            if !items.contains(&entry.item_id) {
                return Err(LibraryError::InvalidSnapshot(format!(
                    "waitlist for unknown item {}",
                    entry.item_id
                )));
            }
            if let Some(unknown) = entry.members.iter().find(|id| members.get(id).is_err()) {
                return Err(LibraryError::InvalidSnapshot(format!(
                    "unknown member {unknown} waitlisted"
                )));
            }
            if !entry.members.is_empty()
                && items.get(&entry.item_id).is_ok_and(Item::is_available)
            {
                return Err(LibraryError::InvalidSnapshot(format!(
                    "item {} has a free copy while members wait",
                    entry.item_id
                )));
            }
        }
        let waitlist = Waitlist::from_entries(snapshot.waitlists, &ledger)?;
        let ratings = RatingStore::from_ratings(snapshot.ratings)
            .map_err(|err| LibraryError::InvalidSnapshot(err.to_string()))?;

        tracing::info!(
            items = items.len(),
            loans = ledger.loans().len(),
            "library restored from snapshot"
        );
        Ok(Self::from_parts(items, members, ledger, waitlist, ratings, policy))
    }
}

/// Verify loans point at known records and agree with copy counts and
/// members' held items
#[allow(clippy::arithmetic_side_effects)]
fn check_loans(
    items: &ItemRegistry,
    members: &MemberRoster,
    ledger: &LoanLedger,
) -> LibraryResult<()> {
    let mut open_per_item: BTreeMap<&str, u32> = BTreeMap::new();
    let mut held: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();

    for loan in ledger.loans() {
        if !items.contains(&loan.item_id) || members.get(&loan.member_id).is_err() {
            return Err(LibraryError::InvalidSnapshot(format!(
                "loan of {} to {} references an unknown record",
                loan.item_id, loan.member_id
            )));
        }
        if loan.is_open() {
            *open_per_item.entry(loan.item_id.as_str()).or_default() += 1;
            held.entry(loan.member_id.as_str()).or_default().insert(loan.item_id.clone());
        }
    }

    for item in items.iter() {
        let open = open_per_item.get(item.id.as_str()).copied().unwrap_or(0);
        if open > item.copies_total - item.copies_available {
            return Err(LibraryError::InvalidSnapshot(format!(
                "item {} has {open} open loans but only {} copies out",
                item.id,
                item.copies_total - item.copies_available
            )));
        }
    }

    let none = BTreeSet::new();
    for member in members.iter() {
        if member.active_loans != *held.get(member.id.as_str()).unwrap_or(&none) {
            return Err(LibraryError::InvalidSnapshot(format!(
                "member {} held items disagree with open loans",
                member.id
            )));
        }
    }
    Ok(())
}
