//! Solvency and atomicity tests.
//!
//! Collateral is a bounded pool: no settlement, close, or exercise may pay out
//! more than the losing side locked. Failed operations must leave every piece
//! of state untouched, and one-shot edges must win exactly once under
//! concurrent callers.

use cardex_core::*;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::thread;

fn charizard() -> InstrumentId {
    InstrumentId::from("Charizard-BaseSet-Rare")
}

fn blastoise() -> InstrumentId {
    InstrumentId::from("Blastoise-BaseSet-Rare")
}

fn setup() -> SettlementCoordinator {
    let coord = SettlementCoordinator::new(CoreConfig::default());
    coord.set_time(Timestamp::from_millis(1_700_000_000_000));
    coord.submit_price(charizard(), dec!(10.00), 95).unwrap();
    coord.submit_price(blastoise(), dec!(9.00), 92).unwrap();
    coord
}

fn active_reference_swap(coord: &SettlementCoordinator) -> PositionId {
    let swap = coord
        .propose_swap(
            PartyId::from("alice"),
            charizard(),
            blastoise(),
            dec!(100),
            dec!(90),
            604_800,
            dec!(15),
        )
        .unwrap();
    coord
        .accept_swap(swap.id, PartyId::from("bob"), dec!(13.50))
        .unwrap();
    swap.id
}

#[test]
fn swap_loss_capped_at_locked_collateral() {
    let coord = setup();
    let id = active_reference_swap(&coord);

    coord.advance_time(604_800);
    // Charizard collapses 90%: proposer-view net is -90 - 0, far beyond
    // alice's 15 locked
    coord.submit_price(charizard(), dec!(1.00), 95).unwrap();
    coord.submit_price(blastoise(), dec!(9.00), 92).unwrap();

    let outcome = coord.settle_swap(id).unwrap();
    assert_eq!(outcome.net, Quote::new(dec!(-90)));
    assert_eq!(outcome.paid_to, PartyId::from("bob"));
    assert_eq!(outcome.transferred, Quote::new(dec!(15)));
    assert!(outcome.capped);
}

#[test]
fn futures_loss_never_returns_negative_collateral() {
    let coord = setup();
    let pos = coord
        .open_futures(PartyId::from("carol"), charizard(), Side::Long, dec!(5), dec!(5))
        .unwrap();

    coord.submit_price(charizard(), dec!(0.50), 95).unwrap();
    let outcome = coord.close_futures(pos.id).unwrap();
    assert_eq!(outcome.realized_pnl, Quote::new(dec!(-47.50)));
    assert_eq!(outcome.collateral_returned, Quote::zero());
}

#[test]
fn failed_proposal_leaves_no_position_behind() {
    let coord = setup();
    let before = coord.ledger().len();

    // under-collateralized
    assert!(coord
        .propose_swap(
            PartyId::from("alice"),
            charizard(),
            blastoise(),
            dec!(100),
            dec!(90),
            604_800,
            dec!(1),
        )
        .is_err());
    // bad duration
    assert!(coord
        .propose_swap(
            PartyId::from("alice"),
            charizard(),
            blastoise(),
            dec!(100),
            dec!(90),
            -1,
            dec!(15),
        )
        .is_err());

    assert_eq!(coord.ledger().len(), before);
    // no audit events either: nothing happened
    assert_eq!(coord.events().len(), 2); // just the two setup price updates
}

#[test]
fn failed_accept_leaves_swap_proposed() {
    let coord = setup();
    let swap = coord
        .propose_swap(
            PartyId::from("alice"),
            charizard(),
            blastoise(),
            dec!(100),
            dec!(90),
            604_800,
            dec!(15),
        )
        .unwrap();

    assert!(coord
        .accept_swap(swap.id, PartyId::from("bob"), dec!(1))
        .is_err());

    let stored = coord.ledger().get(swap.id).unwrap();
    assert_eq!(stored.state, PositionState::Proposed);
    let PositionKind::Swap(terms) = &stored.kind else {
        panic!("not a swap")
    };
    assert_eq!(terms.counterparty, None);
    assert_eq!(terms.counterparty_collateral, Quote::zero());
}

#[test]
fn concurrent_accepts_win_exactly_once() {
    let coord = Arc::new(setup());
    let swap = coord
        .propose_swap(
            PartyId::from("alice"),
            charizard(),
            blastoise(),
            dec!(100),
            dec!(90),
            604_800,
            dec!(15),
        )
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let coord = Arc::clone(&coord);
        let id = swap.id;
        handles.push(thread::spawn(move || {
            coord
                .accept_swap(id, PartyId::new(format!("party-{i}")), dec!(13.50))
                .is_ok()
        }));
    }

    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 1);

    let stored = coord.ledger().get(swap.id).unwrap();
    assert_eq!(stored.state, PositionState::Active);
}

#[test]
fn concurrent_settles_pay_exactly_once() {
    let coord = Arc::new(setup());
    let id = active_reference_swap(&coord);

    coord.advance_time(604_800);
    coord.submit_price(charizard(), dec!(12.00), 95).unwrap();
    coord.submit_price(blastoise(), dec!(9.00), 92).unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let coord = Arc::clone(&coord);
        handles.push(thread::spawn(move || coord.settle_swap(id).is_ok()));
    }

    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 1);

    // exactly one settlement event in the log
    let settled = coord
        .events()
        .iter()
        .filter(|e| matches!(e.payload, EventPayload::SwapSettled(_)))
        .count();
    assert_eq!(settled, 1);
}

#[test]
fn price_update_mid_flight_does_not_invalidate_snapshot() {
    let coord = setup();

    // the proposal validates against 10.00; a later update to the feed does
    // not retroactively touch the stored entry price
    let swap = coord
        .propose_swap(
            PartyId::from("alice"),
            charizard(),
            blastoise(),
            dec!(100),
            dec!(90),
            604_800,
            dec!(15),
        )
        .unwrap();

    coord.submit_price(charizard(), dec!(99.00), 95).unwrap();

    let stored = coord.ledger().get(swap.id).unwrap();
    let PositionKind::Swap(terms) = &stored.kind else {
        panic!("not a swap")
    };
    assert_eq!(terms.entry_price_a, Price::new_unchecked(dec!(10.00)));
}

#[test]
fn audit_log_is_ordered_and_bounded() {
    let mut config = CoreConfig::default();
    config.max_events = 10;
    let coord = SettlementCoordinator::new(config);
    coord.set_time(Timestamp::from_millis(0));

    for i in 0..50 {
        coord
            .submit_price(charizard(), dec!(10) + rust_decimal::Decimal::from(i), 95)
            .unwrap();
    }

    let events = coord.events();
    assert_eq!(events.len(), 10);
    assert!(events.windows(2).all(|w| w[0].id < w[1].id));
    // oldest entries were drained, newest survive
    assert_eq!(events.last().unwrap().id, EventId(50));
}
