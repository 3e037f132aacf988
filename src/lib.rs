// cardex-core: collateralized card-derivatives settlement core.
// oracle-first architecture: no price passes into margin or settlement math
// without clearing the staleness/confidence gate, and all money math is exact
// decimal. deterministic with no external I/O.
//
// file map (search X.0 for the module header):
//   1.x  types.rs: primitives: InstrumentId, PartyId, Price, Quote, Confidence
//   2.x  oracle.rs: per-instrument price store with gated reads
//   3.x  margin.rs: pure collateral/PnL math (no state)
//   4.x  position.rs: position variants and per-kind state machines
//   5.x  ledger.rs: authoritative position table, serialized transitions
//   6.x  config.rs: staleness, confidence floor, margin rates, retention
//   7.x  coordinator.rs: settlement coordinator, the only mutating entry point
//   8.x  api.rs: read-model snapshots for the external web layer
//   9.x  events.rs: state transition events for audit

pub mod api;
pub mod config;
pub mod coordinator;
pub mod events;
pub mod ledger;
pub mod margin;
pub mod oracle;
pub mod position;
pub mod types;

pub use api::{ApiResult, PositionView, PriceView};
pub use config::{CoreConfig, OracleConfig};
pub use coordinator::{
    CloseOutcome, CoreError, ExerciseOutcome, MaintenanceOutcome, MarkToMarket,
    SettlementCoordinator, SwapSettlement,
};
pub use events::{Event, EventId, EventPayload};
pub use ledger::{LedgerError, PositionDraft, PositionLedger};
pub use margin::{MarginError, MarginParams, PositionClass};
pub use oracle::{OracleError, PriceOracle, PriceRecord};
pub use position::{
    FuturesTerms, LifecycleEvent, OptionTerms, Position, PositionKind, PositionState, SwapTerms,
};
pub use types::{
    Bps, Confidence, InstrumentId, PartyId, PositionId, Price, Quote, Side, Timestamp,
};
