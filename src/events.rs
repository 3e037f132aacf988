// 9.0 events.rs: every state change produces an event. used for audit trails,
// state reconstruction, and notifying the external read layer. the
// EventPayload enum lists all event types.

use crate::position::PositionState;
use crate::types::{InstrumentId, PartyId, PositionId, Price, Quote, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Oracle events
    PriceUpdated(PriceUpdatedEvent),
    FeedDeactivated(FeedDeactivatedEvent),

    // Swap events
    SwapProposed(SwapProposedEvent),
    SwapAccepted(SwapAcceptedEvent),
    SwapRejected(SwapRejectedEvent),
    SwapSettled(SwapSettledEvent),

    // Futures events
    FuturesOpened(FuturesOpenedEvent),
    FuturesClosed(FuturesClosedEvent),

    // Options events
    OptionOpened(OptionOpenedEvent),
    OptionExercised(OptionExercisedEvent),
    OptionExpired(OptionExpiredEvent),

    // Risk events
    Liquidated(LiquidatedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdatedEvent {
    pub instrument: InstrumentId,
    pub price: Price,
    pub confidence: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedDeactivatedEvent {
    pub instrument: InstrumentId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapProposedEvent {
    pub position_id: PositionId,
    pub proposer: PartyId,
    pub instrument_a: InstrumentId,
    pub instrument_b: InstrumentId,
    pub notional_a: Quote,
    pub notional_b: Quote,
    pub collateral: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapAcceptedEvent {
    pub position_id: PositionId,
    pub counterparty: PartyId,
    pub collateral: Quote,
    pub matures_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRejectedEvent {
    pub position_id: PositionId,
    pub by: PartyId,
    pub cancelled_by_proposer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapSettledEvent {
    pub position_id: PositionId,
    pub net: Quote,
    pub paid_to: PartyId,
    pub transferred: Quote,
    pub capped: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuturesOpenedEvent {
    pub position_id: PositionId,
    pub owner: PartyId,
    pub instrument: InstrumentId,
    pub units: Decimal,
    pub entry_price: Price,
    pub collateral: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuturesClosedEvent {
    pub position_id: PositionId,
    pub exit_price: Price,
    pub realized_pnl: Quote,
    pub collateral_returned: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionOpenedEvent {
    pub position_id: PositionId,
    pub holder: PartyId,
    pub writer: PartyId,
    pub instrument: InstrumentId,
    pub strike: Price,
    pub expiry: Timestamp,
    pub is_call: bool,
    pub collateral: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionExercisedEvent {
    pub position_id: PositionId,
    pub payout: Quote,
    pub capped: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionExpiredEvent {
    pub position_id: PositionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidatedEvent {
    pub position_id: PositionId,
    pub state_before: PositionState,
    pub equity: Quote,
    pub maintenance_floor: Quote,
}
