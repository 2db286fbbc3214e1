use crate::error::RiskError;
use configuration::Instrument;
use rust_decimal::Decimal;
use tracing::debug;

/// Converts account equity and trade geometry into an order quantity.
///
/// The sizer is a pure function of its inputs plus the instrument rounding
/// rules it was constructed with. It holds no account state and never looks
/// at the market; callers decide which equity figure to size against.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    rules: Instrument,
}

impl PositionSizer {
    /// Creates a new `PositionSizer` with the given instrument rules.
    pub fn new(rules: Instrument) -> Result<Self, RiskError> {
        // Validate that the rounding rules are logical.
        if rules.lot_step <= Decimal::ZERO {
            return Err(RiskError::InvalidParameters(
                "lot_step must be greater than 0".to_string(),
            ));
        }
        if rules.min_units < Decimal::ZERO {
            return Err(RiskError::InvalidParameters(
                "min_units must not be negative".to_string(),
            ));
        }
        Ok(Self { rules })
    }

    /// Performs the stop-distance-driven, fixed-fractional sizing calculation.
    ///
    /// `risk_fraction` of `equity` is the amount lost if the stop is hit, so
    /// the quantity is that amount divided by the per-unit stop distance,
    /// floored to the lot step and clamped up to the venue minimum.
    pub fn size(
        &self,
        equity: Decimal,
        risk_fraction: Decimal,
        entry_price: Decimal,
        stop_price: Decimal,
    ) -> Result<Decimal, RiskError> {
        // --- 1. Validation ---
        if risk_fraction <= Decimal::ZERO || risk_fraction > Decimal::ONE {
            return Err(RiskError::InvalidParameters(format!(
                "risk_fraction must be in (0, 1], got {risk_fraction}"
            )));
        }
        let stop_distance = (entry_price - stop_price).abs();
        if stop_distance <= Decimal::ZERO {
            return Err(RiskError::InvalidStopDistance {
                entry: entry_price,
                stop: stop_price,
            });
        }
        if equity <= Decimal::ZERO {
            return Err(RiskError::InsufficientCapital { equity });
        }

        // --- 2. Risk Capital and Raw Quantity ---
        // The amount of equity this trade is allowed to lose.
        let risk_capital = equity * risk_fraction;
        let raw_units = risk_capital / stop_distance;

        // --- 3. Round to What the Venue Accepts ---
        let units = (raw_units / self.rules.lot_step).floor() * self.rules.lot_step;
        if units.is_zero() {
            return Err(RiskError::InsufficientCapital { equity });
        }
        if units < self.rules.min_units {
            // The venue minimum overrides the risk model.
            debug!(
                "Sized {} units below venue minimum, clamping up to {}",
                units, self.rules.min_units
            );
            return Ok(self.rules.min_units);
        }

        Ok(units)
    }
}
