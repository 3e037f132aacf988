//! Settlement core simulation.
//!
//! Walks the full lifecycle: oracle updates, a bilateral swap from proposal to
//! settlement, futures marking and liquidation, and an option exercise.

use cardex_core::*;
use rust_decimal_macros::dec;

fn main() {
    println!("Card Derivatives Settlement Core Simulation");
    println!("Oracle-Gated Margin, Exact Decimal Settlement\n");

    scenario_1_price_feed();
    scenario_2_swap_lifecycle();
    scenario_3_futures_mark_and_liquidation();
    scenario_4_option_exercise();

    println!("\nAll simulations completed successfully.");
}

fn charizard() -> InstrumentId {
    InstrumentId::from("Charizard-BaseSet-Rare")
}

fn blastoise() -> InstrumentId {
    InstrumentId::from("Blastoise-BaseSet-Rare")
}

fn coordinator() -> SettlementCoordinator {
    let coord = SettlementCoordinator::new(CoreConfig::default());
    coord.set_time(Timestamp::now());
    coord
}

/// Price submission, gating, and deactivation.
fn scenario_1_price_feed() {
    println!("Scenario 1: Price Feed Gating\n");

    let coord = coordinator();
    coord.submit_price(charizard(), dec!(10.00), 95).unwrap();
    println!("  Charizard priced at $10.00, confidence 95%");

    let record = coord.oracle().get_price(&charizard(), coord.time()).unwrap();
    println!("  Gated read: ${} ({})", record.price, record.confidence);

    coord.deactivate_feed(&charizard()).unwrap();
    let refused = coord.oracle().get_price(&charizard(), coord.time());
    println!("  After deactivation: {}", refused.unwrap_err());

    coord.submit_price(charizard(), dec!(10.10), 96).unwrap();
    println!("  Fresh update reactivates the feed\n");
}

/// Propose, accept, mature, settle.
fn scenario_2_swap_lifecycle() {
    println!("Scenario 2: Swap Lifecycle\n");

    let coord = coordinator();
    coord.submit_price(charizard(), dec!(10.00), 95).unwrap();
    coord.submit_price(blastoise(), dec!(9.00), 92).unwrap();

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
    println!("  Alice proposes Charizard/Blastoise swap, 15 collateral locked");

    let under = coord.propose_swap(
        PartyId::from("mallory"),
        charizard(),
        blastoise(),
        dec!(100),
        dec!(90),
        604_800,
        dec!(10),
    );
    println!("  Under-collateralized proposal: {}", under.unwrap_err());

    coord
        .accept_swap(swap.id, PartyId::from("bob"), dec!(13.50))
        .unwrap();
    println!("  Bob accepts with 13.50 collateral, swap is active");

    let early = coord.settle_swap(swap.id);
    println!("  Early settlement attempt: {}", early.unwrap_err());

    coord.advance_time(604_800);
    coord.submit_price(charizard(), dec!(12.00), 95).unwrap();
    coord.submit_price(blastoise(), dec!(9.00), 92).unwrap();

    let outcome = coord.settle_swap(swap.id).unwrap();
    println!(
        "  Settled at maturity: net {} to {}, transferred {} (capped: {})\n",
        outcome.net, outcome.paid_to, outcome.transferred, outcome.capped
    );
}

/// Open, mark-to-market, maintenance sweep, liquidation.
fn scenario_3_futures_mark_and_liquidation() {
    println!("Scenario 3: Futures Marking and Liquidation\n");

    let coord = coordinator();
    coord.submit_price(charizard(), dec!(10.00), 95).unwrap();

    let pos = coord
        .open_futures(PartyId::from("carol"), charizard(), Side::Long, dec!(5), dec!(5))
        .unwrap();
    println!("  Carol longs 5 Charizard @ $10.00 with 5 collateral");

    coord.submit_price(charizard(), dec!(11.00), 95).unwrap();
    let mark = coord.mark_position(pos.id).unwrap();
    println!(
        "  Marked at $11.00: pnl {}, {}%",
        mark.unrealized_pnl, mark.percent_change
    );

    coord.submit_price(charizard(), dec!(9.10), 95).unwrap();
    for (id, outcome) in coord.sweep_maintenance() {
        println!("  Sweep at $9.10: position {} -> {:?}", id, outcome);
    }

    let view = coord.position_view(pos.id).unwrap();
    println!("  Final state: {:?}\n", view.state);
}

/// Write, exercise in the money, capped payout.
fn scenario_4_option_exercise() {
    println!("Scenario 4: Option Exercise\n");

    let coord = coordinator();
    coord.submit_price(charizard(), dec!(10.00), 95).unwrap();

    let expiry = coord.time().plus_seconds(3_600);
    let pos = coord
        .open_option(
            PartyId::from("dave"),
            PartyId::from("erin"),
            charizard(),
            dec!(2),
            dec!(10),
            expiry,
            true,
            dec!(3),
        )
        .unwrap();
    println!("  Erin writes a call on 2 Charizard, strike $10, 3 collateral");

    coord.submit_price(charizard(), dec!(12.00), 95).unwrap();
    let outcome = coord.exercise_option(pos.id).unwrap();
    println!(
        "  Dave exercises at $12.00: payout {} (capped: {})\n",
        outcome.payout, outcome.capped
    );
}
