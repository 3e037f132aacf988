// 4.0 position.rs: the position data model and its state machines.
//
// Positions are a closed tagged-variant set. Every lifecycle operation matches
// exhaustively on (kind, state, event), so adding a fourth kind is a
// compile-time extension, not a string-matching gap. Mutation happens only
// through `Position::apply`, and only the ledger calls it.

use crate::margin::PositionClass;
use crate::types::{InstrumentId, PartyId, PositionId, Price, Quote, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    /// Swap awaiting a counterparty.
    Proposed,
    /// Futures/options position live against the market.
    Open,
    /// Swap accepted by both sides, running toward maturity.
    Active,
    /// Futures closed voluntarily at market.
    Closed,
    /// Swap matured and paid out, or option exercised.
    Settled,
    /// Margin breach ended the position.
    Liquidated,
    /// Swap proposal rejected or cancelled before acceptance.
    Rejected,
    /// Option passed expiry unexercised.
    Expired,
}

impl PositionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PositionState::Closed
                | PositionState::Settled
                | PositionState::Liquidated
                | PositionState::Rejected
                | PositionState::Expired
        )
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Directional exposure on one instrument, sized in card units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuturesTerms {
    pub instrument: InstrumentId,
    pub side: Side,
    pub units: Decimal,
    pub entry_price: Price,
    pub collateral: Quote,
}

/// A call or put written against `writer`'s locked collateral. The position
/// owner is the holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionTerms {
    pub instrument: InstrumentId,
    pub writer: PartyId,
    pub units: Decimal,
    pub strike: Price,
    pub expiry: Timestamp,
    pub is_call: bool,
    pub writer_collateral: Quote,
}

/// Bilateral performance swap: proposer is long leg A, counterparty long leg B.
/// Entry prices for both legs are captured when the proposal is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapTerms {
    pub instrument_a: InstrumentId,
    pub instrument_b: InstrumentId,
    pub notional_a: Quote,
    pub notional_b: Quote,
    pub entry_price_a: Price,
    pub entry_price_b: Price,
    pub proposer: PartyId,
    pub counterparty: Option<PartyId>,
    pub proposer_collateral: Quote,
    pub counterparty_collateral: Quote,
    pub duration_seconds: i64,
    pub activated_at: Option<Timestamp>,
    pub matures_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PositionKind {
    Futures(FuturesTerms),
    Options(OptionTerms),
    Swap(SwapTerms),
}

impl PositionKind {
    pub fn class(&self) -> PositionClass {
        match self {
            PositionKind::Futures(_) => PositionClass::Futures,
            PositionKind::Options(_) => PositionClass::Options,
            PositionKind::Swap(_) => PositionClass::Swap,
        }
    }
}

/// One state-machine edge with the data the edge applies. Constructed by the
/// coordinator, validated and applied by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// Swap: Proposed → Active.
    Accept {
        counterparty: PartyId,
        collateral: Quote,
        activated_at: Timestamp,
        matures_at: Timestamp,
    },
    /// Swap: Proposed → Rejected (counterparty rejects or proposer cancels).
    Reject,
    /// Swap: Active → Settled.
    Settle,
    /// Futures: Open → Closed.
    Close,
    /// Any margin breach: Open/Active → Liquidated.
    Liquidate,
    /// Options: Open → Settled.
    Exercise,
    /// Options: Open → Expired.
    Expire,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Accept { .. } => "accept",
            LifecycleEvent::Reject => "reject",
            LifecycleEvent::Settle => "settle",
            LifecycleEvent::Close => "close",
            LifecycleEvent::Liquidate => "liquidate",
            LifecycleEvent::Exercise => "exercise",
            LifecycleEvent::Expire => "expire",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    /// Proposer for swaps, holder for options, the trader for futures.
    pub owner: PartyId,
    pub kind: PositionKind,
    pub state: PositionState,
    pub opened_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Position {
    pub fn class(&self) -> PositionClass {
        self.kind.class()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Total collateral locked against this position across both sides.
    pub fn collateral_locked(&self) -> Quote {
        match &self.kind {
            PositionKind::Futures(f) => f.collateral,
            PositionKind::Options(o) => o.writer_collateral,
            PositionKind::Swap(s) => s.proposer_collateral.add(s.counterparty_collateral),
        }
    }

    /// Reference notional value: entry value for futures, strike value for
    /// options, leg-A notional for swaps.
    pub fn notional_value(&self) -> Quote {
        match &self.kind {
            PositionKind::Futures(f) => Quote::new(f.units * f.entry_price.value()),
            PositionKind::Options(o) => Quote::new(o.units * o.strike.value()),
            PositionKind::Swap(s) => s.notional_a,
        }
    }

    /// Entry price of the primary leg.
    pub fn entry_price(&self) -> Price {
        match &self.kind {
            PositionKind::Futures(f) => f.entry_price,
            PositionKind::Options(o) => o.strike,
            PositionKind::Swap(s) => s.entry_price_a,
        }
    }

    /// Whether `party` is on either side of this position.
    pub fn involves(&self, party: &PartyId) -> bool {
        if &self.owner == party {
            return true;
        }
        match &self.kind {
            PositionKind::Futures(_) => false,
            PositionKind::Options(o) => &o.writer == party,
            PositionKind::Swap(s) => s.counterparty.as_ref() == Some(party),
        }
    }

    /// Apply one state-machine edge. Exhaustive over (kind, state, event);
    /// anything not listed is an illegal transition and leaves the position
    /// untouched.
    pub fn apply(&mut self, event: &LifecycleEvent, now: Timestamp) -> Result<(), ()> {
        let next = match (&mut self.kind, self.state, event) {
            (
                PositionKind::Swap(terms),
                PositionState::Proposed,
                LifecycleEvent::Accept {
                    counterparty,
                    collateral,
                    activated_at,
                    matures_at,
                },
            ) => {
                terms.counterparty = Some(counterparty.clone());
                terms.counterparty_collateral = *collateral;
                terms.activated_at = Some(*activated_at);
                terms.matures_at = Some(*matures_at);
                PositionState::Active
            }
            (PositionKind::Swap(_), PositionState::Proposed, LifecycleEvent::Reject) => {
                PositionState::Rejected
            }
            (PositionKind::Swap(_), PositionState::Active, LifecycleEvent::Settle) => {
                PositionState::Settled
            }
            (PositionKind::Swap(_), PositionState::Active, LifecycleEvent::Liquidate) => {
                PositionState::Liquidated
            }
            (PositionKind::Futures(_), PositionState::Open, LifecycleEvent::Close) => {
                PositionState::Closed
            }
            (PositionKind::Futures(_), PositionState::Open, LifecycleEvent::Liquidate) => {
                PositionState::Liquidated
            }
            (PositionKind::Options(_), PositionState::Open, LifecycleEvent::Exercise) => {
                PositionState::Settled
            }
            (PositionKind::Options(_), PositionState::Open, LifecycleEvent::Expire) => {
                PositionState::Expired
            }
            _ => return Err(()),
        };
        self.state = next;
        self.updated_at = now;
        Ok(())
    }
}
