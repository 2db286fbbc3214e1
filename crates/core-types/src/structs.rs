use crate::enums::Side;
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single OHLCV candle for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Bar {
    /// Whether the bar's traded range touched the given price.
    pub fn touches(&self, price: Decimal) -> bool {
        self.low <= price && price <= self.high
    }
}

/// A request from a signal source to enter a trade.
///
/// Carries the full intended geometry of the position; sizing is decided
/// later, at the moment the entry price actually trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub side: Side,
    pub entry_price: Decimal,
    pub stop_price: Decimal,
    pub target_price: Decimal,
}

impl Signal {
    /// Checks that the entry, stop and target are on the correct sides of
    /// each other for the signal's direction. A long must have
    /// `stop < entry < target`; a short the mirror image.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.entry_price <= Decimal::ZERO {
            return Err(CoreError::InvalidInput(
                "entry_price".to_string(),
                format!("must be positive, got {}", self.entry_price),
            ));
        }
        match self.side {
            Side::Long => {
                if self.stop_price >= self.entry_price {
                    return Err(CoreError::InvalidInput(
                        "stop_price".to_string(),
                        format!(
                            "must be below entry for a long ({} >= {})",
                            self.stop_price, self.entry_price
                        ),
                    ));
                }
                if self.target_price <= self.entry_price {
                    return Err(CoreError::InvalidInput(
                        "target_price".to_string(),
                        format!(
                            "must be above entry for a long ({} <= {})",
                            self.target_price, self.entry_price
                        ),
                    ));
                }
            }
            Side::Short => {
                if self.stop_price <= self.entry_price {
                    return Err(CoreError::InvalidInput(
                        "stop_price".to_string(),
                        format!(
                            "must be above entry for a short ({} <= {})",
                            self.stop_price, self.entry_price
                        ),
                    ));
                }
                if self.target_price >= self.entry_price {
                    return Err(CoreError::InvalidInput(
                        "target_price".to_string(),
                        format!(
                            "must be below entry for a short ({} >= {})",
                            self.target_price, self.entry_price
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// One observation of total account equity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: Decimal,
}

/// Append-only history of equity observations.
///
/// There is deliberately no way to rewrite or remove a recorded point;
/// consumers only ever see a read-only slice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquityCurve {
    points: Vec<EquityPoint>,
}

impl EquityCurve {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Appends a new observation to the curve.
    pub fn record(&mut self, timestamp: DateTime<Utc>, equity: Decimal) {
        self.points.push(EquityPoint { timestamp, equity });
    }

    pub fn points(&self) -> &[EquityPoint] {
        &self.points
    }

    pub fn last(&self) -> Option<&EquityPoint> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn long_signal() -> Signal {
        Signal {
            symbol: "EURUSD".to_string(),
            side: Side::Long,
            entry_price: dec!(1.0800),
            stop_price: dec!(1.0780),
            target_price: dec!(1.0840),
        }
    }

    #[test]
    fn valid_long_signal_passes() {
        assert!(long_signal().validate().is_ok());
    }

    #[test]
    fn long_with_stop_above_entry_is_rejected() {
        let mut signal = long_signal();
        signal.stop_price = dec!(1.0900);
        assert!(signal.validate().is_err());
    }

    #[test]
    fn zero_stop_distance_is_rejected() {
        let mut signal = long_signal();
        signal.stop_price = signal.entry_price;
        assert!(signal.validate().is_err());
    }

    #[test]
    fn short_requires_mirrored_ordering() {
        let signal = Signal {
            symbol: "EURUSD".to_string(),
            side: Side::Short,
            entry_price: dec!(1.0800),
            stop_price: dec!(1.0820),
            target_price: dec!(1.0760),
        };
        assert!(signal.validate().is_ok());

        let inverted = Signal {
            target_price: dec!(1.0820),
            stop_price: dec!(1.0760),
            ..signal
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn bar_touch_is_inclusive_of_extremes() {
        let bar = Bar {
            timestamp: Utc::now(),
            open: dec!(100),
            high: dec!(105),
            low: dec!(95),
            close: dec!(102),
            volume: dec!(1000),
        };
        assert!(bar.touches(dec!(95)));
        assert!(bar.touches(dec!(105)));
        assert!(bar.touches(dec!(100)));
        assert!(!bar.touches(dec!(94.99)));
    }

    #[test]
    fn equity_curve_appends_in_order() {
        let mut curve = EquityCurve::new();
        assert!(curve.is_empty());
        curve.record(Utc::now(), dec!(100000));
        curve.record(Utc::now(), dec!(100100));
        assert_eq!(curve.len(), 2);
        assert_eq!(curve.last().map(|p| p.equity), Some(dec!(100100)));
    }
}
