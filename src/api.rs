// 8.0 api.rs: serializable read-model snapshots for the external web layer.
//
// The HTTP layer is an external collaborator; these views are the whole
// contract with it. List reads never fail as a whole: when a position's price
// gate refuses (stale, inactive, under-confident), its PnL fields come back
// empty and the structural fields still render.

use crate::coordinator::{CoreError, SettlementCoordinator};
use crate::ledger::LedgerError;
use crate::margin::PositionClass;
use crate::position::PositionState;
use crate::types::{InstrumentId, PartyId, PositionId};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct PriceView {
    pub instrument: InstrumentId,
    pub price: Decimal,
    pub timestamp: i64,
    pub confidence: u8,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionView {
    pub position_id: PositionId,
    #[serde(rename = "type")]
    pub kind: PositionClass,
    pub state: PositionState,
    pub notional: Decimal,
    pub entry_price: Decimal,
    pub collateral_locked: Decimal,
    pub unrealized_pnl: Option<Decimal>,
    pub percent_change: Option<Decimal>,
}

impl SettlementCoordinator {
    pub fn price_view(&self, instrument: &InstrumentId) -> Option<PriceView> {
        self.oracle().record(instrument).map(|r| PriceView {
            instrument: r.instrument,
            price: r.price.value(),
            timestamp: r.timestamp.as_millis(),
            confidence: r.confidence.value(),
            active: r.active,
        })
    }

    pub fn price_views(&self) -> Vec<PriceView> {
        self.oracle()
            .instruments()
            .iter()
            .filter_map(|i| self.price_view(i))
            .collect()
    }

    pub fn position_view(&self, id: PositionId) -> Result<PositionView, LedgerError> {
        let position = self.ledger().get(id)?;
        let mark = self.mark_position(id).ok();
        Ok(PositionView {
            position_id: position.id,
            kind: position.class(),
            state: position.state,
            notional: position.notional_value().value(),
            entry_price: position.entry_price().value(),
            collateral_locked: position.collateral_locked().value(),
            unrealized_pnl: mark.as_ref().map(|m| m.unrealized_pnl.value()),
            percent_change: mark.as_ref().map(|m| m.percent_change),
        })
    }

    pub fn positions_view(&self, party: &PartyId) -> Vec<PositionView> {
        self.ledger()
            .list_by_owner(party)
            .into_iter()
            .filter_map(|p| self.position_view(p.id).ok())
            .collect()
    }
}

// keep CoreError in the public read surface so handler code can match on it
pub type ApiResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::types::{Side, Timestamp};
    use rust_decimal_macros::dec;

    fn coordinator() -> SettlementCoordinator {
        let coord = SettlementCoordinator::new(CoreConfig::default());
        coord.set_time(Timestamp::from_millis(1_000_000));
        coord
            .submit_price(InstrumentId::from("Charizard-BaseSet-Rare"), dec!(10.00), 95)
            .unwrap();
        coord
    }

    #[test]
    fn price_view_round_trips_the_record() {
        let coord = coordinator();
        let view = coord
            .price_view(&InstrumentId::from("Charizard-BaseSet-Rare"))
            .unwrap();
        assert_eq!(view.price, dec!(10.00));
        assert_eq!(view.confidence, 95);
        assert!(view.active);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["instrument"], "Charizard-BaseSet-Rare");
        assert_eq!(json["confidence"], 95);
    }

    #[test]
    fn position_view_serializes_kind_as_type() {
        let coord = coordinator();
        let pos = coord
            .open_futures(
                PartyId::from("carol"),
                InstrumentId::from("Charizard-BaseSet-Rare"),
                Side::Long,
                dec!(5),
                dec!(5),
            )
            .unwrap();

        let view = coord.position_view(pos.id).unwrap();
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["type"], "futures");
        assert_eq!(json["state"], "open");
        assert_eq!(view.unrealized_pnl, Some(dec!(0)));
    }

    #[test]
    fn stale_price_blanks_pnl_not_the_view() {
        let coord = coordinator();
        let pos = coord
            .open_futures(
                PartyId::from("carol"),
                InstrumentId::from("Charizard-BaseSet-Rare"),
                Side::Long,
                dec!(5),
                dec!(5),
            )
            .unwrap();

        coord.advance_time(86_400 + 1);
        let view = coord.position_view(pos.id).unwrap();
        assert_eq!(view.unrealized_pnl, None);
        assert_eq!(view.collateral_locked, dec!(5));
    }

    #[test]
    fn positions_view_by_party() {
        let coord = coordinator();
        coord
            .open_futures(
                PartyId::from("carol"),
                InstrumentId::from("Charizard-BaseSet-Rare"),
                Side::Long,
                dec!(5),
                dec!(5),
            )
            .unwrap();

        assert_eq!(coord.positions_view(&PartyId::from("carol")).len(), 1);
        assert!(coord.positions_view(&PartyId::from("nobody")).is_empty());
    }
}
