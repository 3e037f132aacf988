// 7.0 coordinator.rs: the settlement coordinator. sole entry point for
// state-changing operations.
//
// Every mutating operation follows the same shape: snapshot the gated price(s)
// at entry, validate margin against that snapshot, apply exactly one ledger
// transition, emit an audit event. A price update that lands mid-operation
// never retroactively invalidates a collateral check already in flight, and a
// failed operation leaves all state unchanged.
//
// Concurrent one-shot races (two accepts, two settles) are resolved by the
// ledger: both callers validate, one transition applies, the loser gets
// IllegalTransition and no payout is recorded for it.

use crate::config::CoreConfig;
use crate::events::{
    Event, EventId, EventPayload, FeedDeactivatedEvent, FuturesClosedEvent, FuturesOpenedEvent,
    LiquidatedEvent, OptionExercisedEvent, OptionExpiredEvent, OptionOpenedEvent,
    PriceUpdatedEvent, SwapAcceptedEvent, SwapProposedEvent, SwapRejectedEvent, SwapSettledEvent,
};
use crate::ledger::{LedgerError, PositionDraft, PositionLedger};
use crate::margin::{
    self, MarginError, MarginParams, PositionClass,
};
use crate::oracle::{OracleError, PriceOracle};
use crate::position::{
    FuturesTerms, LifecycleEvent, OptionTerms, Position, PositionKind, PositionState, SwapTerms,
};
use crate::types::{InstrumentId, PartyId, PositionId, Price, Quote, Side, Timestamp};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Margin error: {0}")]
    Margin(#[from] MarginError),

    #[error("Insufficient collateral: required {required}, provided {provided}")]
    InsufficientCollateral { required: Quote, provided: Quote },

    #[error("Notional must be positive, got {0}")]
    InvalidNotional(Decimal),

    #[error("Duration must be positive, got {0}s")]
    InvalidDuration(i64),

    #[error("Strike must be positive, got {0}")]
    InvalidStrike(Decimal),

    #[error("Expiry {expiry} is not in the future (now {now})")]
    InvalidExpiry { expiry: Timestamp, now: Timestamp },

    #[error("Swap {id} matures at {matures_at}, now {now}")]
    NotYetMatured {
        id: PositionId,
        matures_at: Timestamp,
        now: Timestamp,
    },

    #[error("Option {id} is not exercisable at {now}")]
    NotExercisable { id: PositionId, now: Timestamp },

    #[error("Party {party} may not perform this operation on position {id}")]
    Unauthorized { id: PositionId, party: PartyId },

    #[error("Holder and writer of an option must differ, got {0}")]
    SelfDealing(PartyId),

    #[error("Position {0} is not a {1}")]
    WrongKind(PositionId, &'static str),
}

/// Outcome of a matured swap settlement. `transferred` is the amount actually
/// moved; it equals `net.abs()` unless the loser's collateral capped it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapSettlement {
    pub position_id: PositionId,
    /// Proposer-view net: leg-A return minus leg-B return.
    pub net: Quote,
    pub paid_to: PartyId,
    pub transferred: Quote,
    pub capped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseOutcome {
    pub position_id: PositionId,
    pub exit_price: Price,
    pub realized_pnl: Quote,
    /// Collateral handed back: `max(0, collateral + pnl)`. Losses are bounded
    /// by the locked pool.
    pub collateral_returned: Quote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseOutcome {
    pub position_id: PositionId,
    /// Intrinsic value, capped at the writer's locked collateral.
    pub payout: Quote,
    pub capped: bool,
}

/// Stateless mark-to-market snapshot of one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkToMarket {
    pub position_id: PositionId,
    pub unrealized_pnl: Quote,
    pub percent_change: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaintenanceOutcome {
    Healthy { equity: Quote, floor: Quote },
    Liquidated { equity: Quote, floor: Quote },
    /// Proposed swaps, options (no liquidation edge), terminal positions.
    NotApplicable,
}

#[derive(Debug)]
struct EventLog {
    events: Vec<Event>,
    next_id: u64,
}

#[derive(Debug)]
pub struct SettlementCoordinator {
    oracle: Arc<PriceOracle>,
    ledger: Arc<PositionLedger>,
    margin: MarginParams,
    max_events: usize,
    verbose: bool,
    clock: Mutex<Timestamp>,
    log: Mutex<EventLog>,
}

impl SettlementCoordinator {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            oracle: Arc::new(PriceOracle::new(config.oracle)),
            ledger: Arc::new(PositionLedger::new()),
            margin: config.margin,
            max_events: config.max_events,
            verbose: config.verbose,
            clock: Mutex::new(Timestamp::from_millis(0)),
            log: Mutex::new(EventLog {
                events: Vec::new(),
                next_id: 1,
            }),
        }
    }

    pub fn oracle(&self) -> &Arc<PriceOracle> {
        &self.oracle
    }

    pub fn ledger(&self) -> &Arc<PositionLedger> {
        &self.ledger
    }

    pub fn margin_params(&self) -> &MarginParams {
        &self.margin
    }

    // logical clock, settable so every run is reproducible
    pub fn time(&self) -> Timestamp {
        *self.clock.lock()
    }

    pub fn set_time(&self, timestamp: Timestamp) {
        *self.clock.lock() = timestamp;
    }

    pub fn advance_time(&self, seconds: i64) {
        let mut clock = self.clock.lock();
        *clock = clock.plus_seconds(seconds);
    }

    // ---- oracle passthrough ----

    pub fn submit_price(
        &self,
        instrument: InstrumentId,
        price: Decimal,
        confidence: u8,
    ) -> Result<(), CoreError> {
        let now = self.time();
        self.oracle
            .update_price(instrument.clone(), price, confidence, now)?;
        self.emit(EventPayload::PriceUpdated(PriceUpdatedEvent {
            instrument,
            price: Price::new_unchecked(price),
            confidence,
        }));
        Ok(())
    }

    pub fn deactivate_feed(&self, instrument: &InstrumentId) -> Result<(), CoreError> {
        self.oracle.deactivate(instrument)?;
        self.emit(EventPayload::FeedDeactivated(FeedDeactivatedEvent {
            instrument: instrument.clone(),
        }));
        Ok(())
    }

    /// Gated price snapshot with a non-zero entry guard: a zero price is legal
    /// on the feed but useless as an entry (every return against it is
    /// degenerate), so position creation refuses it.
    fn entry_price(&self, instrument: &InstrumentId, now: Timestamp) -> Result<Price, CoreError> {
        let record = self.oracle.get_price(instrument, now)?;
        if record.price.is_zero() {
            return Err(MarginError::DegeneratePosition.into());
        }
        Ok(record.price)
    }

    // ---- swap lifecycle ----

    pub fn propose_swap(
        &self,
        proposer: PartyId,
        instrument_a: InstrumentId,
        instrument_b: InstrumentId,
        notional_a: Decimal,
        notional_b: Decimal,
        duration_seconds: i64,
        proposer_collateral: Decimal,
    ) -> Result<Position, CoreError> {
        let now = self.time();

        if notional_a <= Decimal::ZERO {
            return Err(CoreError::InvalidNotional(notional_a));
        }
        if notional_b <= Decimal::ZERO {
            return Err(CoreError::InvalidNotional(notional_b));
        }
        if duration_seconds <= 0 {
            return Err(CoreError::InvalidDuration(duration_seconds));
        }

        let entry_price_a = self.entry_price(&instrument_a, now)?;
        let entry_price_b = self.entry_price(&instrument_b, now)?;

        let notional_a = Quote::new(notional_a);
        let notional_b = Quote::new(notional_b);
        let provided = Quote::new(proposer_collateral);
        let required = margin::required_collateral(PositionClass::Swap, notional_a, &self.margin);
        if provided < required {
            return Err(CoreError::InsufficientCollateral { required, provided });
        }

        let position = self.ledger.create(
            PositionDraft {
                owner: proposer.clone(),
                kind: PositionKind::Swap(SwapTerms {
                    instrument_a: instrument_a.clone(),
                    instrument_b: instrument_b.clone(),
                    notional_a,
                    notional_b,
                    entry_price_a,
                    entry_price_b,
                    proposer: proposer.clone(),
                    counterparty: None,
                    proposer_collateral: provided,
                    counterparty_collateral: Quote::zero(),
                    duration_seconds,
                    activated_at: None,
                    matures_at: None,
                }),
            },
            now,
        )?;

        self.emit(EventPayload::SwapProposed(SwapProposedEvent {
            position_id: position.id,
            proposer,
            instrument_a,
            instrument_b,
            notional_a,
            notional_b,
            collateral: provided,
        }));
        Ok(position)
    }

    pub fn accept_swap(
        &self,
        id: PositionId,
        counterparty: PartyId,
        counterparty_collateral: Decimal,
    ) -> Result<Position, CoreError> {
        let now = self.time();
        let position = self.ledger.get(id)?;
        let terms = swap_terms(&position)?;

        if counterparty == terms.proposer {
            return Err(CoreError::Unauthorized {
                id,
                party: counterparty,
            });
        }

        let provided = Quote::new(counterparty_collateral);
        let required =
            margin::required_collateral(PositionClass::Swap, terms.notional_b, &self.margin);
        if provided < required {
            return Err(CoreError::InsufficientCollateral { required, provided });
        }

        let matures_at = now.plus_seconds(terms.duration_seconds);
        let accepted = self.ledger.transition(
            id,
            &LifecycleEvent::Accept {
                counterparty: counterparty.clone(),
                collateral: provided,
                activated_at: now,
                matures_at,
            },
            now,
        )?;

        self.emit(EventPayload::SwapAccepted(SwapAcceptedEvent {
            position_id: id,
            counterparty,
            collateral: provided,
            matures_at,
        }));
        Ok(accepted)
    }

    /// Counterparty rejection or proposer cancellation; both end in `Rejected`.
    pub fn reject_swap(&self, id: PositionId, party: PartyId) -> Result<Position, CoreError> {
        let now = self.time();
        let position = self.ledger.get(id)?;
        let terms = swap_terms(&position)?;
        let cancelled_by_proposer = party == terms.proposer;

        let rejected = self.ledger.transition(id, &LifecycleEvent::Reject, now)?;

        self.emit(EventPayload::SwapRejected(SwapRejectedEvent {
            position_id: id,
            by: party,
            cancelled_by_proposer,
        }));
        Ok(rejected)
    }

    /// Settle a matured swap. Net payout flows from the losing side's locked
    /// collateral to the winner, capped at what the loser actually locked.
    /// Excess loss is not retroactively collectible.
    pub fn settle_swap(&self, id: PositionId) -> Result<SwapSettlement, CoreError> {
        let now = self.time();
        let position = self.ledger.get(id)?;
        let terms = swap_terms(&position)?;

        if position.state == PositionState::Active {
            // matures_at is always set on an Active swap
            if let Some(matures_at) = terms.matures_at {
                if now < matures_at {
                    return Err(CoreError::NotYetMatured {
                        id,
                        matures_at,
                        now,
                    });
                }
            }
        }

        let price_a = self.oracle.get_price(&terms.instrument_a, now)?.price;
        let price_b = self.oracle.get_price(&terms.instrument_b, now)?.price;

        let return_a = margin::leg_return(terms.entry_price_a, price_a, terms.notional_a)?;
        let return_b = margin::leg_return(terms.entry_price_b, price_b, terms.notional_b)?;
        let net = return_a.sub(return_b);

        let counterparty = terms.counterparty.clone().ok_or(CoreError::Ledger(
            LedgerError::IllegalTransition {
                id,
                from: position.state,
                event: "settle",
            },
        ))?;

        let (paid_to, payer_pool) = if net.is_negative() {
            (counterparty.clone(), terms.proposer_collateral)
        } else {
            (terms.proposer.clone(), terms.counterparty_collateral)
        };
        let transferred = net.abs().min(payer_pool);
        let capped = net.abs() > payer_pool;

        // one-shot guard: the transition, not the math, decides who settles
        self.ledger.transition(id, &LifecycleEvent::Settle, now)?;

        self.emit(EventPayload::SwapSettled(SwapSettledEvent {
            position_id: id,
            net,
            paid_to: paid_to.clone(),
            transferred,
            capped,
        }));
        Ok(SwapSettlement {
            position_id: id,
            net,
            paid_to,
            transferred,
            capped,
        })
    }

    // ---- futures lifecycle ----

    pub fn open_futures(
        &self,
        owner: PartyId,
        instrument: InstrumentId,
        side: Side,
        units: Decimal,
        collateral: Decimal,
    ) -> Result<Position, CoreError> {
        let now = self.time();

        if units <= Decimal::ZERO {
            return Err(CoreError::InvalidNotional(units));
        }

        let entry_price = self.entry_price(&instrument, now)?;
        let notional = Quote::new(units * entry_price.value());
        let provided = Quote::new(collateral);
        let required = margin::required_collateral(PositionClass::Futures, notional, &self.margin);
        if provided < required {
            return Err(CoreError::InsufficientCollateral { required, provided });
        }

        let position = self.ledger.create(
            PositionDraft {
                owner: owner.clone(),
                kind: PositionKind::Futures(FuturesTerms {
                    instrument: instrument.clone(),
                    side,
                    units,
                    entry_price,
                    collateral: provided,
                }),
            },
            now,
        )?;

        self.emit(EventPayload::FuturesOpened(FuturesOpenedEvent {
            position_id: position.id,
            owner,
            instrument,
            units,
            entry_price,
            collateral: provided,
        }));
        Ok(position)
    }

    /// Read-only mark-to-market against the gated current price. Works for
    /// every kind; never changes state.
    pub fn mark_position(&self, id: PositionId) -> Result<MarkToMarket, CoreError> {
        let now = self.time();
        let position = self.ledger.get(id)?;

        let (pnl, percent) = match &position.kind {
            PositionKind::Futures(f) => {
                let current = self.oracle.get_price(&f.instrument, now)?.price;
                let pnl = margin::unrealized_pnl(f.side, f.units, f.entry_price, current);
                let pct = margin::percent_change(pnl, f.entry_price, f.units)?;
                (pnl, pct)
            }
            PositionKind::Options(o) => {
                let current = self.oracle.get_price(&o.instrument, now)?.price;
                let pnl = margin::option_intrinsic(o.is_call, o.strike, current, o.units);
                let pct = margin::percent_change(pnl, o.strike, o.units)?;
                (pnl, pct)
            }
            PositionKind::Swap(s) => {
                let price_a = self.oracle.get_price(&s.instrument_a, now)?.price;
                let price_b = self.oracle.get_price(&s.instrument_b, now)?.price;
                let net = margin::leg_return(s.entry_price_a, price_a, s.notional_a)?
                    .sub(margin::leg_return(s.entry_price_b, price_b, s.notional_b)?);
                // notional_a is validated positive at proposal
                let pct = net.value() / s.notional_a.value() * dec!(100);
                (net, pct)
            }
        };

        Ok(MarkToMarket {
            position_id: id,
            unrealized_pnl: pnl,
            percent_change: percent,
        })
    }

    pub fn close_futures(&self, id: PositionId) -> Result<CloseOutcome, CoreError> {
        let now = self.time();
        let position = self.ledger.get(id)?;
        let terms = futures_terms(&position)?;

        let exit_price = self.oracle.get_price(&terms.instrument, now)?.price;
        let realized_pnl =
            margin::unrealized_pnl(terms.side, terms.units, terms.entry_price, exit_price);
        let collateral_returned = terms.collateral.add(realized_pnl).max(Quote::zero());

        self.ledger.transition(id, &LifecycleEvent::Close, now)?;

        self.emit(EventPayload::FuturesClosed(FuturesClosedEvent {
            position_id: id,
            exit_price,
            realized_pnl,
            collateral_returned,
        }));
        Ok(CloseOutcome {
            position_id: id,
            exit_price,
            realized_pnl,
            collateral_returned,
        })
    }

    /// Keeper entry point: re-check one position's maintenance floor against
    /// the current price, liquidating on breach. Healthy positions are left
    /// alone; kinds without a liquidation edge report `NotApplicable`.
    pub fn check_maintenance(&self, id: PositionId) -> Result<MaintenanceOutcome, CoreError> {
        let now = self.time();
        let position = self.ledger.get(id)?;

        let (equity, floor) = match (&position.kind, position.state) {
            (PositionKind::Futures(f), PositionState::Open) => {
                let current = self.oracle.get_price(&f.instrument, now)?.price;
                let pnl = margin::unrealized_pnl(f.side, f.units, f.entry_price, current);
                let equity = f.collateral.add(pnl);
                let notional = Quote::new(f.units * current.value());
                let floor = margin::maintenance_collateral(
                    PositionClass::Futures,
                    notional,
                    &self.margin,
                );
                (equity, floor)
            }
            (PositionKind::Swap(s), PositionState::Active) => {
                let price_a = self.oracle.get_price(&s.instrument_a, now)?.price;
                let price_b = self.oracle.get_price(&s.instrument_b, now)?.price;
                let net = margin::leg_return(s.entry_price_a, price_a, s.notional_a)?
                    .sub(margin::leg_return(s.entry_price_b, price_b, s.notional_b)?);

                // each side carries its own floor; the first breach liquidates
                let proposer_equity = s.proposer_collateral.add(net);
                let counterparty_equity = s.counterparty_collateral.sub(net);
                let proposer_floor = margin::maintenance_collateral(
                    PositionClass::Swap,
                    s.notional_a,
                    &self.margin,
                );
                let counterparty_floor = margin::maintenance_collateral(
                    PositionClass::Swap,
                    s.notional_b,
                    &self.margin,
                );

                if proposer_equity < proposer_floor {
                    (proposer_equity, proposer_floor)
                } else {
                    (counterparty_equity, counterparty_floor)
                }
            }
            _ => return Ok(MaintenanceOutcome::NotApplicable),
        };

        if equity >= floor {
            return Ok(MaintenanceOutcome::Healthy { equity, floor });
        }

        let state_before = position.state;
        self.ledger.transition(id, &LifecycleEvent::Liquidate, now)?;
        self.emit(EventPayload::Liquidated(LiquidatedEvent {
            position_id: id,
            state_before,
            equity,
            maintenance_floor: floor,
        }));
        Ok(MaintenanceOutcome::Liquidated { equity, floor })
    }

    /// Maintenance sweep over every open position. Positions whose price gate
    /// fails are skipped: the core never guesses a price, the keeper retries
    /// after a fresh update.
    pub fn sweep_maintenance(&self) -> Vec<(PositionId, MaintenanceOutcome)> {
        self.ledger
            .list_open()
            .into_iter()
            .filter_map(|p| self.check_maintenance(p.id).ok().map(|o| (p.id, o)))
            .collect()
    }

    // ---- options lifecycle ----

    #[allow(clippy::too_many_arguments)]
    pub fn open_option(
        &self,
        holder: PartyId,
        writer: PartyId,
        instrument: InstrumentId,
        units: Decimal,
        strike: Decimal,
        expiry: Timestamp,
        is_call: bool,
        writer_collateral: Decimal,
    ) -> Result<Position, CoreError> {
        let now = self.time();

        if units <= Decimal::ZERO {
            return Err(CoreError::InvalidNotional(units));
        }
        if strike <= Decimal::ZERO {
            return Err(CoreError::InvalidStrike(strike));
        }
        if expiry <= now {
            return Err(CoreError::InvalidExpiry { expiry, now });
        }
        if holder == writer {
            return Err(CoreError::SelfDealing(writer));
        }

        // the instrument must have a usable price even though the strike sets
        // the collateral base
        self.entry_price(&instrument, now)?;

        let strike = Price::new_unchecked(strike);
        let notional = Quote::new(units * strike.value());
        let provided = Quote::new(writer_collateral);
        let required = margin::required_collateral(PositionClass::Options, notional, &self.margin);
        if provided < required {
            return Err(CoreError::InsufficientCollateral { required, provided });
        }

        let position = self.ledger.create(
            PositionDraft {
                owner: holder.clone(),
                kind: PositionKind::Options(OptionTerms {
                    instrument: instrument.clone(),
                    writer: writer.clone(),
                    units,
                    strike,
                    expiry,
                    is_call,
                    writer_collateral: provided,
                }),
            },
            now,
        )?;

        self.emit(EventPayload::OptionOpened(OptionOpenedEvent {
            position_id: position.id,
            holder,
            writer,
            instrument,
            strike,
            expiry,
            is_call,
            collateral: provided,
        }));
        Ok(position)
    }

    /// Exercise within `[issue, expiry]`. Pays the holder the intrinsic value,
    /// capped at the writer's locked collateral.
    pub fn exercise_option(&self, id: PositionId) -> Result<ExerciseOutcome, CoreError> {
        let now = self.time();
        let position = self.ledger.get(id)?;
        let terms = option_terms(&position)?;

        if position.state != PositionState::Open || now > terms.expiry {
            return Err(CoreError::NotExercisable { id, now });
        }

        let current = self.oracle.get_price(&terms.instrument, now)?.price;
        let intrinsic = margin::option_intrinsic(terms.is_call, terms.strike, current, terms.units);
        let payout = intrinsic.min(terms.writer_collateral);
        let capped = intrinsic > terms.writer_collateral;

        self.ledger.transition(id, &LifecycleEvent::Exercise, now)?;

        self.emit(EventPayload::OptionExercised(OptionExercisedEvent {
            position_id: id,
            payout,
            capped,
        }));
        Ok(ExerciseOutcome {
            position_id: id,
            payout,
            capped,
        })
    }

    /// Keeper op: retire an option whose expiry has passed unexercised.
    pub fn expire_option(&self, id: PositionId) -> Result<Position, CoreError> {
        let now = self.time();
        let position = self.ledger.get(id)?;
        let terms = option_terms(&position)?;

        if now <= terms.expiry {
            return Err(CoreError::NotYetMatured {
                id,
                matures_at: terms.expiry,
                now,
            });
        }

        let expired = self.ledger.transition(id, &LifecycleEvent::Expire, now)?;
        self.emit(EventPayload::OptionExpired(OptionExpiredEvent {
            position_id: id,
        }));
        Ok(expired)
    }

    // ---- audit log ----

    pub fn events(&self) -> Vec<Event> {
        self.log.lock().events.clone()
    }

    pub fn recent_events(&self, count: usize) -> Vec<Event> {
        let log = self.log.lock();
        let start = log.events.len().saturating_sub(count);
        log.events[start..].to_vec()
    }

    fn emit(&self, payload: EventPayload) {
        let now = self.time();
        let mut log = self.log.lock();
        let event = Event::new(EventId(log.next_id), now, payload);
        log.next_id += 1;

        if self.verbose {
            println!("[Event {}] {:?}", event.id.0, event.payload);
        }

        log.events.push(event);

        if log.events.len() > self.max_events {
            let drain_count = log.events.len() - self.max_events;
            log.events.drain(0..drain_count);
        }
    }
}

fn swap_terms(position: &Position) -> Result<&SwapTerms, CoreError> {
    match &position.kind {
        PositionKind::Swap(terms) => Ok(terms),
        _ => Err(CoreError::WrongKind(position.id, "swap")),
    }
}

fn futures_terms(position: &Position) -> Result<&FuturesTerms, CoreError> {
    match &position.kind {
        PositionKind::Futures(terms) => Ok(terms),
        _ => Err(CoreError::WrongKind(position.id, "futures")),
    }
}

fn option_terms(position: &Position) -> Result<&OptionTerms, CoreError> {
    match &position.kind {
        PositionKind::Options(terms) => Ok(terms),
        _ => Err(CoreError::WrongKind(position.id, "option")),
    }
}
