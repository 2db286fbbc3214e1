use crate::error::LifecycleError;
use chrono::{DateTime, Utc};
use configuration::{Config, SizingMode, TieBreak};
use core_types::{Bar, CloseReason, Side, Signal, Trade};
use ledger::{EquityLedger, OpenPosition};
use risk::{PositionSizer, RiskError};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Which equity figure each fill is sized against.
#[derive(Debug, Clone)]
enum SizingBasis {
    /// The live equity of the shared pool at the fill instant.
    Compounding,
    /// A fixed per-symbol slice of starting capital, resolved at run start.
    Isolated(HashMap<String, Decimal>),
}

/// Drives every trade through Pending -> Open -> Closed against the bars.
///
/// The manager owns the pending book (at most one pending and one open trade
/// per symbol) and is the only component that asks the ledger to open or
/// close positions, so every state transition funnels through one place.
#[derive(Debug)]
pub struct TradeManager {
    sizer: PositionSizer,
    risk_fraction: Decimal,
    sizing: SizingBasis,
    tie_break: TieBreak,
    pending: HashMap<String, Trade>,
    close_requests: HashSet<String>,
}

impl TradeManager {
    /// Builds a manager for the given run symbols.
    ///
    /// In isolated mode the per-symbol capital slices are fixed here, before
    /// the first bar: either the explicit allocation table from config, or
    /// an equal split of starting capital.
    pub fn new(config: &Config, symbols: &[String]) -> Result<Self, LifecycleError> {
        let sizer = PositionSizer::new(config.instrument.clone())?;
        let sizing = match config.risk_management.sizing_mode {
            SizingMode::Compounding => SizingBasis::Compounding,
            SizingMode::Isolated => {
                if symbols.is_empty() {
                    return Err(LifecycleError::InvalidSetup(
                        "isolated sizing needs at least one symbol".to_string(),
                    ));
                }
                let allocations = match &config.risk_management.allocations {
                    Some(table) => {
                        let mut resolved = HashMap::new();
                        for symbol in symbols {
                            let amount = table.get(symbol).copied().ok_or_else(|| {
                                LifecycleError::MissingAllocation(symbol.clone())
                            })?;
                            resolved.insert(symbol.clone(), amount);
                        }
                        resolved
                    }
                    None => {
                        let share = config.account.starting_capital
                            / Decimal::from(symbols.len() as u64);
                        symbols.iter().map(|s| (s.clone(), share)).collect()
                    }
                };
                SizingBasis::Isolated(allocations)
            }
        };
        Ok(Self {
            sizer,
            risk_fraction: config.risk_management.risk_per_trade_pct,
            sizing,
            tie_break: config.execution.tie_break,
            pending: HashMap::new(),
            close_requests: HashSet::new(),
        })
    }

    /// Offers a signal to the pending book.
    ///
    /// Returns the new trade's id, or `None` when the signal is rejected:
    /// bad price geometry, or the symbol already has a pending or open
    /// trade. Rejections are logged and never abort the run.
    pub fn submit(
        &mut self,
        signal: &Signal,
        signal_time: DateTime<Utc>,
        ledger: &EquityLedger,
    ) -> Option<Uuid> {
        if self.pending.contains_key(&signal.symbol) {
            warn!(
                "Rejected signal for {}: a pending trade already exists",
                signal.symbol
            );
            return None;
        }
        if ledger.position(&signal.symbol).is_some() {
            warn!(
                "Rejected signal for {}: an open position already exists",
                signal.symbol
            );
            return None;
        }
        match Trade::from_signal(signal, signal_time) {
            Ok(trade) => {
                let id = trade.id;
                debug!(
                    "Accepted {:?} signal for {} @ {} (stop {}, target {})",
                    signal.side,
                    signal.symbol,
                    signal.entry_price,
                    signal.stop_price,
                    signal.target_price
                );
                self.pending.insert(signal.symbol.clone(), trade);
                Some(id)
            }
            Err(err) => {
                warn!("Rejected signal for {}: {}", signal.symbol, err);
                None
            }
        }
    }

    /// Marks a symbol for liquidation at the open of its next bar.
    ///
    /// The request only acts on an open position. If the symbol is flat when
    /// its next bar arrives, the request is logged and discarded; a pending
    /// order is not affected. If no further bar ever arrives for the symbol,
    /// the position falls to the end-of-run sweep instead and closes as
    /// `Expired`.
    pub fn request_close(&mut self, symbol: &str) {
        debug!("Manual close requested for {}", symbol);
        self.close_requests.insert(symbol.to_string());
    }

    /// Processes one bar for one symbol and returns any trades it closed.
    ///
    /// Order within the bar: manual close requests settle at the open, then
    /// the open position is checked against stop and target, then a pending
    /// trade may fill (and is immediately subject to the same exit check).
    pub fn on_bar(
        &mut self,
        symbol: &str,
        bar: &Bar,
        ledger: &mut EquityLedger,
    ) -> Result<Vec<Trade>, LifecycleError> {
        let mut closed = Vec::new();

        // 1. Manual close requests act first, at the bar's open price.
        //    Only an open position can be closed; on a flat symbol the
        //    request is a logged no-op and any pending order stays live.
        if self.close_requests.remove(symbol) {
            if ledger.position(symbol).is_some() {
                closed.push(ledger.close_position(
                    symbol,
                    bar.open,
                    CloseReason::Manual,
                    bar.timestamp,
                )?);
            } else {
                warn!("Manual close requested for {} but no position is open", symbol);
            }
        }

        // 2. Exit sweep for the open position.
        if let Some((price, reason)) = self.exit_for(ledger.position(symbol), bar) {
            closed.push(ledger.close_position(symbol, price, reason, bar.timestamp)?);
        }

        // 3. Fill attempt for the pending trade. Entries only trade on bars
        //    strictly after the signal bar, and only into a flat symbol.
        if ledger.position(symbol).is_none() {
            let fillable = self.pending.get(symbol).is_some_and(|pending| {
                pending
                    .signal_time()
                    .is_some_and(|t| bar.timestamp > t && bar.touches(pending.entry_price))
            });
            if fillable {
                if let Some(trade) = self.pending.remove(symbol) {
                    if self.try_fill(trade, bar, ledger)? {
                        // The fill bar itself may already take the trade out.
                        if let Some((price, reason)) = self.exit_for(ledger.position(symbol), bar)
                        {
                            closed.push(ledger.close_position(
                                symbol,
                                price,
                                reason,
                                bar.timestamp,
                            )?);
                        }
                    }
                }
            }
        }

        Ok(closed)
    }

    /// Force-closes every open position at its last marked price and drops
    /// whatever is still pending. Returns `(closed, cancelled)`.
    pub fn finalize(
        &mut self,
        timestamp: DateTime<Utc>,
        ledger: &mut EquityLedger,
    ) -> Result<(Vec<Trade>, Vec<Trade>), LifecycleError> {
        let mut closed = Vec::new();
        for symbol in ledger.open_symbols() {
            let Some(position) = ledger.position(&symbol) else {
                continue;
            };
            let mark = position.last_mark;
            closed.push(ledger.close_position(&symbol, mark, CloseReason::Expired, timestamp)?);
        }

        let mut cancelled: Vec<Trade> = self.pending.drain().map(|(_, trade)| trade).collect();
        cancelled.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        for trade in &cancelled {
            info!(
                "Run ended with pending trade {} for {} unfilled",
                trade.id, trade.symbol
            );
        }
        self.close_requests.clear();
        Ok((closed, cancelled))
    }

    pub fn has_pending(&self, symbol: &str) -> bool {
        self.pending.contains_key(symbol)
    }

    /// Pending trades in deterministic (symbol) order.
    pub fn pending_trades(&self) -> Vec<&Trade> {
        let mut trades: Vec<&Trade> = self.pending.values().collect();
        trades.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        trades
    }

    /// Decides whether the bar takes the position out, and at what price.
    ///
    /// When one bar touches both exits the configured tie-break wins; the
    /// default assumes the stop traded first.
    fn exit_for(
        &self,
        position: Option<&OpenPosition>,
        bar: &Bar,
    ) -> Option<(Decimal, CloseReason)> {
        let trade = &position?.trade;
        let stop_hit = match trade.side {
            Side::Long => bar.low <= trade.stop_price,
            Side::Short => bar.high >= trade.stop_price,
        };
        let target_hit = match trade.side {
            Side::Long => bar.high >= trade.target_price,
            Side::Short => bar.low <= trade.target_price,
        };
        match (stop_hit, target_hit) {
            (true, true) => match self.tie_break {
                TieBreak::StopFirst => Some((trade.stop_price, CloseReason::StopLoss)),
                TieBreak::TargetFirst => Some((trade.target_price, CloseReason::TakeProfit)),
            },
            (true, false) => Some((trade.stop_price, CloseReason::StopLoss)),
            (false, true) => Some((trade.target_price, CloseReason::TakeProfit)),
            (false, false) => None,
        }
    }

    /// Sizes and opens a pending trade at its entry price.
    ///
    /// Returns `Ok(false)` when sizing rejects the trade for skippable
    /// reasons; the pending order is cancelled and the run continues.
    fn try_fill(
        &mut self,
        trade: Trade,
        bar: &Bar,
        ledger: &mut EquityLedger,
    ) -> Result<bool, LifecycleError> {
        let equity_basis = match &self.sizing {
            SizingBasis::Compounding => ledger.current_equity(),
            SizingBasis::Isolated(allocations) => allocations
                .get(&trade.symbol)
                .copied()
                .ok_or_else(|| LifecycleError::MissingAllocation(trade.symbol.clone()))?,
        };
        match self.sizer.size(
            equity_basis,
            self.risk_fraction,
            trade.entry_price,
            trade.stop_price,
        ) {
            Ok(units) => {
                let opened = trade.fill(bar.timestamp, units, units)?;
                ledger.open_position(opened)?;
                Ok(true)
            }
            Err(
                err @ (RiskError::InvalidStopDistance { .. }
                | RiskError::InsufficientCapital { .. }),
            ) => {
                warn!(
                    "Cancelled pending trade {} for {}: {}",
                    trade.id, trade.symbol, err
                );
                Ok(false)
            }
            // Anything else means the run's own parameters are broken.
            Err(err) => Err(err.into()),
        }
    }
}
