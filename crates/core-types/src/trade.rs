use crate::enums::{CloseReason, Side, TradeStatus};
use crate::error::CoreError;
use crate::structs::Signal;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single trade moving through its lifecycle.
///
/// The intent (symbol, side, entry/stop/target) is fixed when the signal is
/// accepted. Everything that changes over the trade's life lives in
/// [`TradeState`], and the only way through the states is the consuming
/// `fill` and `close` transitions, so a closed trade can never be filled or
/// closed a second time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub entry_price: Decimal,
    pub stop_price: Decimal,
    pub target_price: Decimal,
    pub state: TradeState,
}

/// The mutable half of a trade. `Closed` is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TradeState {
    /// Signal accepted, waiting for the entry price to trade.
    Pending { signal_time: DateTime<Utc> },
    /// Filled and live in the market.
    Open {
        opened_at: DateTime<Utc>,
        requested_units: Decimal,
        filled_units: Decimal,
    },
    /// Flat. Carries the full fill record so history needs no other source.
    Closed {
        opened_at: DateTime<Utc>,
        requested_units: Decimal,
        filled_units: Decimal,
        closed_at: DateTime<Utc>,
        exit_price: Decimal,
        reason: CloseReason,
        realized_pnl: Decimal,
    },
}

/// P&L of a filled quantity for a move from `entry` to `price`.
fn directional_pnl(entry: Decimal, price: Decimal, units: Decimal, side: Side) -> Decimal {
    (price - entry) * units * side.sign()
}

impl Trade {
    /// Creates a `Pending` trade from a validated signal.
    pub fn from_signal(signal: &Signal, signal_time: DateTime<Utc>) -> Result<Self, CoreError> {
        signal.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            symbol: signal.symbol.clone(),
            side: signal.side,
            entry_price: signal.entry_price,
            stop_price: signal.stop_price,
            target_price: signal.target_price,
            state: TradeState::Pending {
                signal_time,
            },
        })
    }

    pub fn status(&self) -> TradeStatus {
        match self.state {
            TradeState::Pending { .. } => TradeStatus::Pending,
            TradeState::Open { .. } => TradeStatus::Open,
            TradeState::Closed { .. } => TradeStatus::Closed,
        }
    }

    /// Marks the pending trade as filled with the quantity chosen at the
    /// fill instant. Only valid from `Pending`.
    pub fn fill(
        self,
        opened_at: DateTime<Utc>,
        requested_units: Decimal,
        filled_units: Decimal,
    ) -> Result<Self, CoreError> {
        match self.state {
            TradeState::Pending { .. } => Ok(Self {
                state: TradeState::Open {
                    opened_at,
                    requested_units,
                    filled_units,
                },
                ..self
            }),
            _ => Err(CoreError::InvalidTransition {
                trade_id: self.id,
                current: self.status(),
                attempted: "fill",
            }),
        }
    }

    /// Closes an open trade at `exit_price`, folding the realized P&L into
    /// the terminal state. Only valid from `Open`.
    pub fn close(
        self,
        exit_price: Decimal,
        reason: CloseReason,
        closed_at: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        match self.state {
            TradeState::Open {
                opened_at,
                requested_units,
                filled_units,
            } => {
                let realized_pnl =
                    directional_pnl(self.entry_price, exit_price, filled_units, self.side);
                Ok(Self {
                    state: TradeState::Closed {
                        opened_at,
                        requested_units,
                        filled_units,
                        closed_at,
                        exit_price,
                        reason,
                        realized_pnl,
                    },
                    ..self
                })
            }
            _ => Err(CoreError::InvalidTransition {
                trade_id: self.id,
                current: self.status(),
                attempted: "close",
            }),
        }
    }

    /// P&L of the open quantity if the trade were marked at `price`.
    ///
    /// This is the one place a price move becomes money; mark-to-market and
    /// realized P&L both run through the same arithmetic.
    pub fn pnl_at(&self, price: Decimal) -> Result<Decimal, CoreError> {
        match &self.state {
            TradeState::Open { filled_units, .. } => Ok(directional_pnl(
                self.entry_price,
                price,
                *filled_units,
                self.side,
            )),
            _ => Err(CoreError::InvalidTransition {
                trade_id: self.id,
                current: self.status(),
                attempted: "mark",
            }),
        }
    }

    pub fn signal_time(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            TradeState::Pending { signal_time } => Some(*signal_time),
            _ => None,
        }
    }

    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            TradeState::Pending { .. } => None,
            TradeState::Open { opened_at, .. } | TradeState::Closed { opened_at, .. } => {
                Some(*opened_at)
            }
        }
    }

    pub fn filled_units(&self) -> Option<Decimal> {
        match &self.state {
            TradeState::Pending { .. } => None,
            TradeState::Open { filled_units, .. } | TradeState::Closed { filled_units, .. } => {
                Some(*filled_units)
            }
        }
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            TradeState::Closed { closed_at, .. } => Some(*closed_at),
            _ => None,
        }
    }

    pub fn exit_price(&self) -> Option<Decimal> {
        match &self.state {
            TradeState::Closed { exit_price, .. } => Some(*exit_price),
            _ => None,
        }
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        match &self.state {
            TradeState::Closed { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn realized_pnl(&self) -> Option<Decimal> {
        match &self.state {
            TradeState::Closed { realized_pnl, .. } => Some(*realized_pnl),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_signal() -> Signal {
        Signal {
            symbol: "EURUSD".to_string(),
            side: Side::Long,
            entry_price: dec!(1.0800),
            stop_price: dec!(1.0780),
            target_price: dec!(1.0840),
        }
    }

    fn pending_trade() -> Trade {
        Trade::from_signal(&sample_signal(), Utc::now()).unwrap()
    }

    #[test]
    fn from_signal_starts_pending() {
        let trade = pending_trade();
        assert_eq!(trade.status(), TradeStatus::Pending);
        assert!(trade.signal_time().is_some());
        assert!(trade.filled_units().is_none());
    }

    #[test]
    fn fill_then_close_walks_the_full_lifecycle() {
        let now = Utc::now();
        let trade = pending_trade()
            .fill(now, dec!(500000), dec!(500000))
            .unwrap();
        assert_eq!(trade.status(), TradeStatus::Open);
        assert_eq!(trade.filled_units(), Some(dec!(500000)));

        let trade = trade
            .close(dec!(1.0840), CloseReason::TakeProfit, now)
            .unwrap();
        assert_eq!(trade.status(), TradeStatus::Closed);
        // 0.0040 move on 500,000 units.
        assert_eq!(trade.realized_pnl(), Some(dec!(2000.0000)));
        assert_eq!(trade.close_reason(), Some(CloseReason::TakeProfit));
    }

    #[test]
    fn closed_is_final() {
        let now = Utc::now();
        let trade = pending_trade()
            .fill(now, dec!(1000), dec!(1000))
            .unwrap()
            .close(dec!(1.0780), CloseReason::StopLoss, now)
            .unwrap();
        let err = trade.clone().close(dec!(1.0840), CloseReason::Manual, now);
        assert!(err.is_err());
        let err = trade.fill(now, dec!(1), dec!(1));
        assert!(err.is_err());
    }

    #[test]
    fn cannot_close_a_pending_trade() {
        let trade = pending_trade();
        assert!(trade
            .close(dec!(1.0840), CloseReason::TakeProfit, Utc::now())
            .is_err());
    }

    #[test]
    fn short_pnl_gains_when_price_falls() {
        let signal = Signal {
            symbol: "EURUSD".to_string(),
            side: Side::Short,
            entry_price: dec!(1.0800),
            stop_price: dec!(1.0820),
            target_price: dec!(1.0760),
        };
        let trade = Trade::from_signal(&signal, Utc::now())
            .unwrap()
            .fill(Utc::now(), dec!(100000), dec!(100000))
            .unwrap();
        assert_eq!(trade.pnl_at(dec!(1.0790)).unwrap(), dec!(100.0000));
        assert_eq!(trade.pnl_at(dec!(1.0810)).unwrap(), dec!(-100.0000));
    }

    #[test]
    fn pnl_requires_an_open_trade() {
        let trade = pending_trade();
        assert!(trade.pnl_at(dec!(1.0800)).is_err());
    }
}
