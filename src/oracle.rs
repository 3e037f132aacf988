// 2.0 oracle.rs: per-instrument price store with a staleness/confidence gate.
//
// The core is agnostic to where prices come from; a scraper, a keeper, or a
// reporting service submits updates and the oracle only validates and stores
// them. One record per instrument, overwritten on update. History is an
// external collaborator's concern.

use crate::config::OracleConfig;
use crate::types::{Confidence, InstrumentId, Price, Timestamp};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Latest known price for one instrument. `active = false` means the feed was
/// marked bad; the record stays for audit but gated reads refuse it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub instrument: InstrumentId,
    pub price: Price,
    pub timestamp: Timestamp,
    pub confidence: Confidence,
    pub active: bool,
}

impl PriceRecord {
    pub fn is_stale(&self, now: Timestamp, max_staleness_seconds: i64) -> bool {
        self.timestamp.elapsed_seconds(&now) > max_staleness_seconds
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("Confidence {0} out of range 0-100")]
    InvalidConfidence(u8),

    #[error("Negative price {0} rejected")]
    InvalidPrice(Decimal),

    #[error("No price has ever been submitted for {0}")]
    UnknownInstrument(InstrumentId),

    #[error("Price for {instrument} is stale: {age_seconds}s old, max {max_seconds}s")]
    StalePrice {
        instrument: InstrumentId,
        age_seconds: i64,
        max_seconds: i64,
    },

    #[error("Price feed for {0} is deactivated")]
    InactivePrice(InstrumentId),

    #[error("Confidence {confidence} for {instrument} below floor {floor}")]
    LowConfidence {
        instrument: InstrumentId,
        confidence: u8,
        floor: u8,
    },
}

/// Shared price map. Writers overwrite whole records under the write lock, so
/// readers never observe a half-applied update.
#[derive(Debug)]
pub struct PriceOracle {
    config: OracleConfig,
    records: RwLock<HashMap<InstrumentId, PriceRecord>>,
}

impl PriceOracle {
    pub fn new(config: OracleConfig) -> Self {
        Self {
            config,
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Validate and store a price update. Visible to readers immediately.
    pub fn update_price(
        &self,
        instrument: InstrumentId,
        price: Decimal,
        confidence: u8,
        now: Timestamp,
    ) -> Result<(), OracleError> {
        let confidence =
            Confidence::new(confidence).ok_or(OracleError::InvalidConfidence(confidence))?;
        let price = Price::new(price).ok_or(OracleError::InvalidPrice(price))?;

        let record = PriceRecord {
            instrument: instrument.clone(),
            price,
            timestamp: now,
            confidence,
            active: true,
        };
        self.records.write().insert(instrument, record);
        Ok(())
    }

    /// Gated read: the record must exist, be active, be fresh, and meet the
    /// confidence floor. This is the only read settlement code may use.
    pub fn get_price(
        &self,
        instrument: &InstrumentId,
        now: Timestamp,
    ) -> Result<PriceRecord, OracleError> {
        let records = self.records.read();
        let record = records
            .get(instrument)
            .ok_or_else(|| OracleError::UnknownInstrument(instrument.clone()))?;

        if !record.active {
            return Err(OracleError::InactivePrice(instrument.clone()));
        }

        let age = record.timestamp.elapsed_seconds(&now);
        if age > self.config.max_staleness_seconds {
            return Err(OracleError::StalePrice {
                instrument: instrument.clone(),
                age_seconds: age,
                max_seconds: self.config.max_staleness_seconds,
            });
        }

        if record.confidence.value() < self.config.min_confidence {
            return Err(OracleError::LowConfidence {
                instrument: instrument.clone(),
                confidence: record.confidence.value(),
                floor: self.config.min_confidence,
            });
        }

        Ok(record.clone())
    }

    /// Mark a feed as known-bad. The record is kept; gated reads fail with
    /// `InactivePrice` until a fresh update reactivates it.
    pub fn deactivate(&self, instrument: &InstrumentId) -> Result<(), OracleError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(instrument)
            .ok_or_else(|| OracleError::UnknownInstrument(instrument.clone()))?;
        record.active = false;
        Ok(())
    }

    /// Ungated record read for the external read API. Never used for margin
    /// or settlement math.
    pub fn record(&self, instrument: &InstrumentId) -> Option<PriceRecord> {
        self.records.read().get(instrument).cloned()
    }

    pub fn instruments(&self) -> Vec<InstrumentId> {
        let mut keys: Vec<_> = self.records.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn oracle() -> PriceOracle {
        PriceOracle::new(OracleConfig::default())
    }

    fn charizard() -> InstrumentId {
        InstrumentId::from("Charizard-BaseSet-Rare")
    }

    #[test]
    fn read_after_write() {
        let oracle = oracle();
        let now = Timestamp::from_millis(1_000);

        oracle
            .update_price(charizard(), dec!(5.00), 90, now)
            .unwrap();
        let record = oracle.get_price(&charizard(), now).unwrap();

        assert_eq!(record.price.value(), dec!(5.00));
        assert_eq!(record.confidence.value(), 90);
        assert_eq!(record.timestamp, now);
        assert!(record.active);
    }

    #[test]
    fn latest_update_wins() {
        let oracle = oracle();
        let t0 = Timestamp::from_millis(1_000);
        let t1 = Timestamp::from_millis(2_000);

        oracle.update_price(charizard(), dec!(5.00), 90, t0).unwrap();
        oracle.update_price(charizard(), dec!(7.25), 95, t1).unwrap();

        let record = oracle.get_price(&charizard(), t1).unwrap();
        assert_eq!(record.price.value(), dec!(7.25));
        assert_eq!(record.timestamp, t1);
    }

    #[test]
    fn unknown_instrument() {
        let oracle = oracle();
        let err = oracle
            .get_price(&charizard(), Timestamp::from_millis(0))
            .unwrap_err();
        assert_eq!(err, OracleError::UnknownInstrument(charizard()));
    }

    #[test]
    fn rejects_bad_confidence_and_price() {
        let oracle = oracle();
        let now = Timestamp::from_millis(0);

        assert_eq!(
            oracle.update_price(charizard(), dec!(5), 101, now),
            Err(OracleError::InvalidConfidence(101))
        );
        assert_eq!(
            oracle.update_price(charizard(), dec!(-5), 90, now),
            Err(OracleError::InvalidPrice(dec!(-5)))
        );
        // failed updates leave no record behind
        assert!(oracle.record(&charizard()).is_none());
    }

    #[test]
    fn stale_price_gated() {
        let oracle = oracle();
        let t0 = Timestamp::from_millis(0);
        oracle.update_price(charizard(), dec!(5), 90, t0).unwrap();

        // one second past the 24h default
        let later = t0.plus_seconds(86_400 + 1);
        let err = oracle.get_price(&charizard(), later).unwrap_err();
        assert!(matches!(err, OracleError::StalePrice { .. }));

        // exactly at the threshold is still fresh
        let at_limit = t0.plus_seconds(86_400);
        assert!(oracle.get_price(&charizard(), at_limit).is_ok());
    }

    #[test]
    fn deactivated_feed_refused_until_refreshed() {
        let oracle = oracle();
        let now = Timestamp::from_millis(0);
        oracle.update_price(charizard(), dec!(5), 90, now).unwrap();

        oracle.deactivate(&charizard()).unwrap();
        assert_eq!(
            oracle.get_price(&charizard(), now),
            Err(OracleError::InactivePrice(charizard()))
        );
        // the record survives deactivation for audit
        assert!(oracle.record(&charizard()).is_some());

        // a fresh update reactivates
        oracle.update_price(charizard(), dec!(6), 92, now).unwrap();
        assert!(oracle.get_price(&charizard(), now).is_ok());
    }

    #[test]
    fn confidence_floor_gated() {
        let oracle = oracle();
        let now = Timestamp::from_millis(0);
        oracle.update_price(charizard(), dec!(5), 10, now).unwrap();

        let err = oracle.get_price(&charizard(), now).unwrap_err();
        assert!(matches!(err, OracleError::LowConfidence { floor: 50, .. }));
    }

    #[test]
    fn deactivate_unknown_instrument() {
        let oracle = oracle();
        assert_eq!(
            oracle.deactivate(&charizard()),
            Err(OracleError::UnknownInstrument(charizard()))
        );
    }
}
