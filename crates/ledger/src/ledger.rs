use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use core_types::{CloseReason, Trade, TradeState, TradeStatus};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info};

/// An open position under the ledger's custody, with its latest mark.
#[derive(Debug, Clone)]
pub struct OpenPosition {
    pub trade: Trade,
    /// P&L of the position at the most recent mark. Never part of cash.
    pub unrealized_pnl: Decimal,
    /// Price of the most recent mark; forced liquidation settles here.
    pub last_mark: Decimal,
}

/// The single source of truth for cash, open positions and equity.
///
/// Cash changes only when realized P&L is folded in at close time or when
/// capital is deposited or withdrawn. Opening a position never moves cash
/// (margin-style accounting), and unrealized P&L lives only on the position
/// itself, so no figure can ever be counted twice.
#[derive(Debug, Clone)]
pub struct EquityLedger {
    starting_capital: Decimal,
    cash: Decimal,
    positions: HashMap<String, OpenPosition>,
}

impl EquityLedger {
    /// Creates a ledger holding `starting_capital` in cash and no positions.
    pub fn new(starting_capital: Decimal) -> Self {
        Self {
            starting_capital,
            cash: starting_capital,
            positions: HashMap::new(),
        }
    }

    /// Total account equity: cash plus the unrealized P&L of every open
    /// position. This method is the only place equity is ever computed.
    pub fn current_equity(&self) -> Decimal {
        let unrealized: Decimal = self.positions.values().map(|p| p.unrealized_pnl).sum();
        self.cash + unrealized
    }

    /// Takes custody of a freshly filled trade.
    ///
    /// Cash is deliberately untouched: the position's worth is carried as
    /// unrealized P&L until it closes. One position per symbol; a second
    /// open for the same symbol is a structural error.
    pub fn open_position(&mut self, trade: Trade) -> Result<(), LedgerError> {
        if trade.status() != TradeStatus::Open {
            return Err(LedgerError::NotAnOpenTrade(trade.id));
        }
        if self.positions.contains_key(&trade.symbol) {
            return Err(LedgerError::DuplicateOpenPosition(trade.symbol.clone()));
        }
        info!(
            "Opened {:?} {} x{} @ {}",
            trade.side,
            trade.symbol,
            trade.filled_units().unwrap_or_default(),
            trade.entry_price
        );
        let entry_price = trade.entry_price;
        self.positions.insert(
            trade.symbol.clone(),
            OpenPosition {
                trade,
                unrealized_pnl: Decimal::ZERO,
                last_mark: entry_price,
            },
        );
        Ok(())
    }

    /// Revalues one symbol's position at the given price.
    ///
    /// Bars routinely arrive for symbols with no position; that is a no-op,
    /// not an error.
    pub fn mark_to_market(&mut self, symbol: &str, price: Decimal) -> Result<(), LedgerError> {
        let Some(position) = self.positions.get_mut(symbol) else {
            return Ok(());
        };
        position.unrealized_pnl = position.trade.pnl_at(price)?;
        position.last_mark = price;
        debug!(
            "Marked {} @ {}, unrealized {}",
            symbol, price, position.unrealized_pnl
        );
        Ok(())
    }

    /// Closes the symbol's position at `exit_price`, folding the realized
    /// P&L into cash exactly once, and returns the finalized trade.
    pub fn close_position(
        &mut self,
        symbol: &str,
        exit_price: Decimal,
        reason: CloseReason,
        closed_at: DateTime<Utc>,
    ) -> Result<Trade, LedgerError> {
        let position = self
            .positions
            .remove(symbol)
            .ok_or_else(|| LedgerError::NoOpenPosition(symbol.to_string()))?;
        let closed = position.trade.close(exit_price, reason, closed_at)?;
        let TradeState::Closed { realized_pnl, .. } = closed.state else {
            return Err(LedgerError::NotAClosedTrade(closed.id));
        };
        self.cash += realized_pnl;
        info!(
            "Closed {} @ {} ({:?}), realized {}",
            symbol, exit_price, reason, realized_pnl
        );
        Ok(closed)
    }

    /// Adds external capital to cash.
    pub fn deposit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidCashFlow(amount));
        }
        self.cash += amount;
        info!("Deposited {}, cash now {}", amount, self.cash);
        Ok(())
    }

    /// Removes capital from cash. Only settled cash can leave the account;
    /// unrealized P&L cannot be withdrawn.
    pub fn withdraw(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidCashFlow(amount));
        }
        if amount > self.cash {
            return Err(LedgerError::InsufficientCash {
                requested: amount,
                available: self.cash,
            });
        }
        self.cash -= amount;
        info!("Withdrew {}, cash now {}", amount, self.cash);
        Ok(())
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn starting_capital(&self) -> Decimal {
        self.starting_capital
    }

    pub fn position(&self, symbol: &str) -> Option<&OpenPosition> {
        self.positions.get(symbol)
    }

    pub fn open_positions(&self) -> &HashMap<String, OpenPosition> {
        &self.positions
    }

    /// Symbols with a live position, sorted for deterministic iteration.
    pub fn open_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.positions.keys().cloned().collect();
        symbols.sort();
        symbols
    }
}
