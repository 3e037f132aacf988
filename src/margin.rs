// 3.0 margin.rs: pure collateral and pnl math. no state, no I/O, no floats.
//
// Initial collateral to open a position is a per-class basis-point rate on
// notional value. Maintenance is a fraction of initial; equity below it makes
// the position liquidatable.
//
// The swap rate of 15% on the proposing leg's notional is fixed policy.
// Futures and options rates are risk parameters, so they are configuration
// inputs rather than constants at call sites.

use crate::types::{Bps, Price, Quote, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Which margin schedule applies. One entry per position variant, so adding a
/// variant forces a rate decision here at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionClass {
    Futures,
    Options,
    Swap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginParams {
    /// Futures initial collateral rate, on entry notional value.
    pub futures_rate: Bps,
    /// Options writer collateral rate, on strike notional value.
    pub options_rate: Bps,
    /// Swap collateral rate, on each leg's own notional. Observed policy: 15%.
    pub swap_rate: Bps,
    /// Maintenance floor as a fraction of the initial requirement.
    pub maintenance_ratio: Decimal,
}

impl Default for MarginParams {
    fn default() -> Self {
        Self {
            futures_rate: Bps::new(1000),
            options_rate: Bps::new(1500),
            swap_rate: Bps::new(1500),
            maintenance_ratio: dec!(0.5),
        }
    }
}

impl MarginParams {
    pub fn rate_for(&self, class: PositionClass) -> Bps {
        match class {
            PositionClass::Futures => self.futures_rate,
            PositionClass::Options => self.options_rate,
            PositionClass::Swap => self.swap_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarginError {
    #[error("Degenerate position: zero entry value in a return computation")]
    DegeneratePosition,
}

/// Initial collateral required to hold `notional_value` of the given class.
pub fn required_collateral(
    class: PositionClass,
    notional_value: Quote,
    params: &MarginParams,
) -> Quote {
    notional_value.abs().mul(params.rate_for(class).as_fraction())
}

/// Minimum equity to keep the position open.
pub fn maintenance_collateral(
    class: PositionClass,
    notional_value: Quote,
    params: &MarginParams,
) -> Quote {
    required_collateral(class, notional_value, params).mul(params.maintenance_ratio)
}

/// Paper gains/losses on a unit position. Long: `(current − entry) × units`.
pub fn unrealized_pnl(side: Side, units: Decimal, entry: Price, current: Price) -> Quote {
    Quote::new(side.sign() * units * (current.value() - entry.value()))
}

/// PnL as a percentage of entry value. Fails rather than dividing by zero.
pub fn percent_change(pnl: Quote, entry: Price, units: Decimal) -> Result<Decimal, MarginError> {
    let entry_value = entry.value() * units.abs();
    if entry_value.is_zero() {
        return Err(MarginError::DegeneratePosition);
    }
    Ok(pnl.value() / entry_value * dec!(100))
}

/// Value-notional return of a swap leg: `notional × (current − entry) / entry`.
pub fn leg_return(entry: Price, current: Price, notional: Quote) -> Result<Quote, MarginError> {
    if entry.is_zero() {
        return Err(MarginError::DegeneratePosition);
    }
    Ok(notional.mul((current.value() - entry.value()) / entry.value()))
}

/// Intrinsic value of an option at the given price, per the full unit count.
/// Calls pay `max(0, current − strike)`, puts the inverse. Never negative.
pub fn option_intrinsic(is_call: bool, strike: Price, current: Price, units: Decimal) -> Quote {
    let per_unit = if is_call {
        current.value() - strike.value()
    } else {
        strike.value() - current.value()
    };
    Quote::new(per_unit.max(Decimal::ZERO) * units.abs())
}
