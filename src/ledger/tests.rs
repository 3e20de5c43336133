use chrono::{Days, NaiveDate};

use crate::{
    error::{Ineligibility, LibraryError, LibraryResult},
    ledger::{LoanLedger, LoanRules, ReturnReceipt},
    loan::{Loan, LoanState},
    media::MediaKind,
    member::{Member, MemberRoster},
    registry::{Item, ItemRegistry},
};

/// Day `offset` of the test calendar; day 0 is Monday 2024-01-01
fn day(offset: u64) -> NaiveDate {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN);
    start.checked_add_days(Days::new(offset)).unwrap_or(start)
}

/// Catalog, roster and ledger shared by the tests below
struct Fixture {
    /// Catalog with one single-copy book and one two-copy video
    items: ItemRegistry,
    /// Members M1 and M2
    members: MemberRoster,
    /// Ledger under test
    ledger: LoanLedger,
}

fn setup_fixture(rules: LoanRules) -> Fixture {
    let mut items = ItemRegistry::new();
    let book = Item::new("BK101", "Dune", "Frank Herbert", MediaKind::PhysicalBook, 1);
    assert!(items.register(book).is_ok());
    let video = Item::new("DV301", "Arrival", "Denis Villeneuve", MediaKind::Video, 2);
    assert!(items.register(video).is_ok());

    let mut members = MemberRoster::new();
    assert!(members.add(Member::new("M1", "Ada")).is_ok());
    assert!(members.add(Member::new("M2", "Grace")).is_ok());

    Fixture { items, members, ledger: LoanLedger::new(rules) }
}

fn borrow_on(
    f: &mut Fixture,
    member_id: &str,
    item_id: &str,
    on: NaiveDate,
) -> LibraryResult<Loan> {
    f.ledger.borrow(&mut f.items, &mut f.members, member_id, item_id, on)
}

fn return_on(
    f: &mut Fixture,
    member_id: &str,
    item_id: &str,
    on: NaiveDate,
    daily_fee: f64,
    grace_days: u32,
) -> LibraryResult<ReturnReceipt> {
    f.ledger.return_item(
        &mut f.items,
        &mut f.members,
        member_id,
        item_id,
        on,
        daily_fee,
        grace_days,
    )
}

fn available(fixture: &Fixture, item_id: &str) -> Option<u32> {
    fixture.items.get(item_id).map(|item| item.copies_available).ok()
}

#[test]
fn test_borrow_sets_due_date_from_media_kind() {
    let mut f = setup_fixture(LoanRules::default());

    let loan = borrow_on(&mut f, "M1", "BK101", day(0));
    assert!(matches!(loan, Ok(ref loan) if loan.due_on == day(21) && loan.loan_days == 21));

    let video = borrow_on(&mut f, "M1", "DV301", day(0));
    assert!(matches!(video, Ok(ref loan) if loan.due_on == day(7)));

    assert_eq!(available(&f, "BK101"), Some(0));
    assert!(f.members.get("M1").is_ok_and(|m| m.holds("BK101") && m.holds("DV301")));
}

#[test]
fn test_borrow_with_weekend_skipping() {
    let mut f = setup_fixture(LoanRules { skip_weekends: true, balance_limit: None });

    // 7 weekdays from Monday 2024-01-01 is Wednesday 2024-01-10
    let loan = borrow_on(&mut f, "M1", "DV301", day(0));
    assert!(matches!(loan, Ok(ref loan) if loan.due_on == day(9)));
}

#[test]
fn test_borrow_unavailable_item_changes_nothing() {
    let mut f = setup_fixture(LoanRules::default());
    assert!(borrow_on(&mut f, "M1", "BK101", day(0)).is_ok());

    let result = borrow_on(&mut f, "M2", "BK101", day(1));
    assert!(matches!(
        result,
        Err(LibraryError::ItemUnavailable { ref item_id }) if item_id == "BK101"
    ));

    assert_eq!(available(&f, "BK101"), Some(0));
    assert_eq!(f.ledger.loans().len(), 1);
    assert!(f.members.get("M2").is_ok_and(|m| m.active_loans.is_empty()));
}

#[test]
fn test_duplicate_loan_rejected() {
    let mut f = setup_fixture(LoanRules::default());
    assert!(borrow_on(&mut f, "M1", "DV301", day(0)).is_ok());

    let again = borrow_on(&mut f, "M1", "DV301", day(1));
    assert!(matches!(again, Err(LibraryError::DuplicateLoan { .. })));
    assert_eq!(available(&f, "DV301"), Some(1));
}

#[test]
fn test_inactive_member_rejected() {
    let mut f = setup_fixture(LoanRules::default());
    assert!(f.members.set_active("M2", false).is_ok());

    let result = borrow_on(&mut f, "M2", "DV301", day(0));
    assert!(matches!(
        result,
        Err(LibraryError::MemberInactive { reason: Ineligibility::Inactive, .. })
    ));
    assert_eq!(available(&f, "DV301"), Some(2));
}

#[test]
fn test_balance_limit_blocks_borrowing() {
    let mut f = setup_fixture(LoanRules { skip_weekends: false, balance_limit: Some(1.0) });

    // M1 runs up 3 overdue days at 0.5
    assert!(borrow_on(&mut f, "M1", "DV301", day(0)).is_ok());
    assert!(return_on(&mut f, "M1", "DV301", day(10), 0.5, 0).is_ok());

    let blocked = borrow_on(&mut f, "M1", "BK101", day(10));
    assert!(matches!(
        blocked,
        Err(LibraryError::MemberInactive { reason: Ineligibility::BalanceOverLimit { .. }, .. })
    ));

    assert!(f.members.pay("M1", 1.0).is_ok());
    assert!(borrow_on(&mut f, "M1", "BK101", day(10)).is_ok());
}

#[test]
fn test_borrow_then_return_restores_copies() {
    let mut f = setup_fixture(LoanRules::default());
    let before = available(&f, "DV301");

    assert!(borrow_on(&mut f, "M1", "DV301", day(0)).is_ok());
    let receipt = return_on(&mut f, "M1", "DV301", day(3), 0.25, 0);

    assert!(matches!(receipt, Ok(ref r) if r.on_time && r.fee == 0.0));
    assert_eq!(available(&f, "DV301"), before);
    assert!(f.ledger.open_loan("M1", "DV301").is_none());
    assert_eq!(f.ledger.loans().len(), 1);
}

#[test]
fn test_return_without_loan_fails() {
    let mut f = setup_fixture(LoanRules::default());

    let result = return_on(&mut f, "M1", "BK101", day(0), 0.5, 0);
    assert!(matches!(result, Err(LibraryError::NoOpenLoan { .. })));
    assert_eq!(available(&f, "BK101"), Some(1));
}

#[test]
fn test_late_return_charges_fee() {
    let mut f = setup_fixture(LoanRules::default());
    assert!(borrow_on(&mut f, "M1", "BK101", day(0)).is_ok());

    let receipt = return_on(&mut f, "M1", "BK101", day(25), 0.5, 0);
    assert!(matches!(receipt, Ok(ref r) if r.overdue_days == 4 && r.fee == 2.0 && !r.on_time));
    assert!(f.members.get("M1").is_ok_and(|m| m.balance == 2.0));
}

#[test]
fn test_grace_period_boundary() {
    let mut f = setup_fixture(LoanRules::default());

    // Exactly grace_days after due date: no fee
    assert!(borrow_on(&mut f, "M1", "DV301", day(0)).is_ok());
    let within = return_on(&mut f, "M1", "DV301", day(7 + 3), 0.75, 3);
    assert!(matches!(within, Ok(ref r) if r.fee == 0.0 && r.on_time));

    // One day beyond grace: exactly one daily fee
    assert!(borrow_on(&mut f, "M2", "DV301", day(0)).is_ok());
    let beyond = return_on(&mut f, "M2", "DV301", day(7 + 4), 0.75, 3);
    assert!(matches!(beyond, Ok(ref r) if r.fee == 0.75 && r.overdue_days == 1));
}

#[test]
fn test_is_overdue_is_strictly_after_due_date() {
    let mut f = setup_fixture(LoanRules::default());
    let loan = borrow_on(&mut f, "M1", "DV301", day(0));
    assert!(loan.is_ok());

    if let Some(loan) = f.ledger.open_loan("M1", "DV301") {
        assert!(!LoanLedger::is_overdue(loan, day(7)));
        assert!(LoanLedger::is_overdue(loan, day(8)));
    }
}

#[test]
fn test_loan_keeps_period_fixed_at_creation() {
    let mut f = setup_fixture(LoanRules::default());
    assert!(borrow_on(&mut f, "M1", "DV301", day(0)).is_ok());

    // Switching rules afterwards leaves the open loan alone
    f.ledger.set_rules(LoanRules { skip_weekends: true, balance_limit: None });
    assert!(f.ledger.open_loan("M1", "DV301").is_some_and(|l| l.due_on == day(7)));
}

#[test]
fn test_report_recomputes_fines_for_today() {
    let mut f = setup_fixture(LoanRules::default());

    // Closed on time, closed 2 days late, still open
    assert!(borrow_on(&mut f, "M1", "DV301", day(0)).is_ok());
    assert!(return_on(&mut f, "M1", "DV301", day(5), 0.5, 0).is_ok());
    assert!(borrow_on(&mut f, "M2", "DV301", day(0)).is_ok());
    assert!(return_on(&mut f, "M2", "DV301", day(9), 0.5, 0).is_ok());
    assert!(borrow_on(&mut f, "M1", "BK101", day(0)).is_ok());

    let early = f.ledger.generate_report(day(20), 0.5);
    assert_eq!(early.total_loans, 3);
    assert_eq!(early.open_loans, 1);
    assert_eq!(early.overdue_loans, 0);
    assert_eq!(early.late_returns, 1);
    assert!((early.total_fines - 1.0).abs() < f64::EPSILON);
    assert_eq!(early.most_active_member.as_deref(), Some("M1"));
    assert_eq!(early.most_borrowed_item.as_deref(), Some("DV301"));

    // Another date gives another total without touching the ledger
    let late = f.ledger.generate_report(day(25), 0.5);
    assert_eq!(late.overdue_loans, 1);
    assert!((late.total_fines - 3.0).abs() < f64::EPSILON);
    assert!(late.member_activity.get("M1").is_some_and(|a| a.borrowed == 2 && a.late == 1));
}

#[test]
fn test_overdue_notices_apply_grace() {
    let mut f = setup_fixture(LoanRules::default());
    assert!(borrow_on(&mut f, "M1", "DV301", day(0)).is_ok());
    assert!(borrow_on(&mut f, "M2", "BK101", day(0)).is_ok());

    let notices = f.ledger.overdue_notices(day(10), 0.25, 1);
    assert_eq!(notices.len(), 1);
    assert!(notices
        .first()
        .is_some_and(|n| n.member_id == "M1" && n.overdue_days == 2 && n.fee_so_far == 0.5));

    assert!(f.ledger.overdue_notices(day(8), 0.25, 1).is_empty());
}

#[test]
fn test_returned_loan_is_kept_as_history() {
    let mut f = setup_fixture(LoanRules::default());
    assert!(borrow_on(&mut f, "M1", "BK101", day(0)).is_ok());
    assert!(f.ledger.loans().first().is_some_and(|l| l.state() == LoanState::Borrowed));

    assert!(return_on(&mut f, "M1", "BK101", day(4), 0.5, 0).is_ok());
    assert!(f.ledger.loans().first().is_some_and(|l| l.state() == LoanState::Returned(day(4))));
    assert_eq!(f.ledger.borrowed_item_ids("M1").into_iter().collect::<Vec<_>>(), ["BK101"]);

    // A fresh loan object is needed to borrow again
    assert!(borrow_on(&mut f, "M1", "BK101", day(5)).is_ok());
    assert_eq!(f.ledger.loans().len(), 2);
}
