use crate::error::AccountantError;
use crate::events::MarketEvent;
use crate::stop::StopToken;
use analytics::{AnalyticsEngine, PerformanceReport};
use chrono::{DateTime, Utc};
use configuration::Config;
use core_types::{Bar, EquityCurve, Signal, Trade};
use indicatif::{ProgressBar, ProgressStyle};
use ledger::{EquityLedger, OpenPosition};
use lifecycle::TradeManager;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{info, warn};

/// The seam a strategy plugs into.
///
/// The accountant calls `evaluate` once per bar for the bar's own symbol,
/// after exits and fills for that bar have settled. Returning a signal is
/// an offer, not an order: the lifecycle manager may still reject it.
pub trait SignalSource {
    fn evaluate(&mut self, bar: &Bar) -> Option<Signal>;
}

/// Owns the shared ledger and drives one simulation over the master stream.
///
/// Every event passes through the same sequence: lifecycle first (manual
/// closes, exits, fills), then the symbol's signal source, then a mark at
/// the bar's close, then exactly one equity point read from the ledger.
/// The accountant records history; it never computes equity itself.
pub struct PortfolioAccountant {
    ledger: EquityLedger,
    manager: TradeManager,
    sources: HashMap<String, Box<dyn SignalSource>>,
    analytics: AnalyticsEngine,
    equity_curve: EquityCurve,
    closed_trades: Vec<Trade>,
    cancelled_trades: Vec<Trade>,
    stop: StopToken,
    last_event: Option<(DateTime<Utc>, String)>,
    finished: bool,
}

impl PortfolioAccountant {
    /// Builds an accountant over the given signal sources, one per symbol.
    ///
    /// The source map defines the run's symbol universe; in isolated sizing
    /// mode the per-symbol capital slices are resolved against it here.
    pub fn new(
        config: &Config,
        sources: HashMap<String, Box<dyn SignalSource>>,
    ) -> Result<Self, AccountantError> {
        let mut symbols: Vec<String> = sources.keys().cloned().collect();
        symbols.sort();
        let manager = TradeManager::new(config, &symbols)?;
        let ledger = EquityLedger::new(config.account.starting_capital);
        info!(
            "Accountant initialized with {} of capital across {} symbols",
            config.account.starting_capital,
            symbols.len()
        );
        Ok(Self {
            ledger,
            manager,
            sources,
            analytics: AnalyticsEngine::new(),
            equity_curve: EquityCurve::new(),
            closed_trades: Vec::new(),
            cancelled_trades: Vec::new(),
            stop: StopToken::new(),
            last_event: None,
            finished: false,
        })
    }

    /// Processes one event from the master stream.
    ///
    /// Events may never move the `(timestamp, symbol)` clock backwards; a
    /// stale event means the caller's stream is corrupt and the run aborts
    /// rather than book trades against it. Repeats of the current clock
    /// value are legal: a symbol may post several bars at one timestamp.
    pub fn step(&mut self, event: &MarketEvent) -> Result<(), AccountantError> {
        if self.finished {
            return Err(AccountantError::RunFinished);
        }
        if let Some((last_time, last_symbol)) = &self.last_event {
            if (event.bar.timestamp, event.symbol.as_str()) < (*last_time, last_symbol.as_str()) {
                return Err(AccountantError::OutOfOrderEvents {
                    symbol: event.symbol.clone(),
                    timestamp: event.bar.timestamp,
                });
            }
        }

        // 1. Lifecycle: manual closes, exit sweep, fill attempt.
        let closed = self
            .manager
            .on_bar(&event.symbol, &event.bar, &mut self.ledger)?;
        self.closed_trades.extend(closed);

        // 2. Let the symbol's strategy see the completed bar.
        if let Some(source) = self.sources.get_mut(&event.symbol) {
            if let Some(signal) = source.evaluate(&event.bar) {
                if signal.symbol == event.symbol {
                    self.manager
                        .submit(&signal, event.bar.timestamp, &self.ledger);
                } else {
                    warn!(
                        "Dropped signal for {} emitted by the {} source",
                        signal.symbol, event.symbol
                    );
                }
            }
        }

        // 3. Mark the symbol to the bar's close, then record the equity
        //    point for this event. One event, one point.
        self.ledger.mark_to_market(&event.symbol, event.bar.close)?;
        self.record_equity(event.bar.timestamp)?;

        self.last_event = Some((event.bar.timestamp, event.symbol.clone()));
        Ok(())
    }

    /// Runs the whole stream and finalizes, yielding the performance report.
    ///
    /// Checks the stop token between events; a stop lands on an event
    /// boundary and still goes through the end-of-run sweep, so the report
    /// covers everything booked up to that point.
    pub fn run(&mut self, events: &[MarketEvent]) -> Result<PerformanceReport, AccountantError> {
        if events.is_empty() {
            return Err(AccountantError::EmptyStream);
        }

        let progress_bar = ProgressBar::new(events.len() as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );

        for event in events {
            if self.stop.is_stopped() {
                info!(
                    "Stop requested; ending the run after {} of {} events",
                    self.equity_curve.len(),
                    events.len()
                );
                break;
            }
            self.step(event)?;
            progress_bar.inc(1);
        }
        progress_bar.finish_with_message("Simulation complete.");

        self.finalize()
    }

    /// Ends the run: expires open positions at their last mark, drops
    /// unfilled pending trades and computes the final report.
    ///
    /// After this the accountant is read-only; further `step` or
    /// `finalize` calls return [`AccountantError::RunFinished`].
    pub fn finalize(&mut self) -> Result<PerformanceReport, AccountantError> {
        if self.finished {
            return Err(AccountantError::RunFinished);
        }
        self.finished = true;

        let last = self.last_event.as_ref().map(|(time, _)| *time);
        if let Some(timestamp) = last {
            let (closed, cancelled) = self.manager.finalize(timestamp, &mut self.ledger)?;
            self.closed_trades.extend(closed);
            self.cancelled_trades.extend(cancelled);
            // The sweep may have realized P&L; the curve's last point must
            // agree with the ledger the report is built from.
            self.record_equity(timestamp)?;
        }

        let report = self.analytics.calculate(
            &self.closed_trades,
            &self.equity_curve,
            self.ledger.starting_capital(),
        )?;
        info!(
            "Run finished: {} trades closed, final equity {}",
            self.closed_trades.len(),
            self.ledger.current_equity()
        );
        Ok(report)
    }

    /// Asks for the symbol's position to be liquidated at its next bar's open.
    pub fn request_close(&mut self, symbol: &str) {
        self.manager.request_close(symbol);
    }

    /// Adds external capital to the shared pool.
    pub fn deposit(&mut self, amount: Decimal) -> Result<(), AccountantError> {
        Ok(self.ledger.deposit(amount)?)
    }

    /// Removes capital from the shared pool; fails if cash cannot cover it.
    pub fn withdraw(&mut self, amount: Decimal) -> Result<(), AccountantError> {
        Ok(self.ledger.withdraw(amount)?)
    }

    /// A handle other threads can use to stop the run between events.
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    pub fn equity_curve(&self) -> &EquityCurve {
        &self.equity_curve
    }

    pub fn closed_trades(&self) -> &[Trade] {
        &self.closed_trades
    }

    /// Pending trades cancelled by the end-of-run sweep.
    pub fn cancelled_trades(&self) -> &[Trade] {
        &self.cancelled_trades
    }

    pub fn pending_trades(&self) -> Vec<&Trade> {
        self.manager.pending_trades()
    }

    pub fn open_positions(&self) -> &HashMap<String, OpenPosition> {
        self.ledger.open_positions()
    }

    pub fn ledger(&self) -> &EquityLedger {
        &self.ledger
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Reads equity from the ledger and appends it to the curve.
    ///
    /// Negative equity means the account blew through zero inside a bar;
    /// everything after that point would be fiction, so the run aborts.
    fn record_equity(&mut self, timestamp: DateTime<Utc>) -> Result<(), AccountantError> {
        let equity = self.ledger.current_equity();
        if equity < Decimal::ZERO {
            return Err(AccountantError::NegativeEquity { timestamp, equity });
        }
        self.equity_curve.record(timestamp, equity);
        Ok(())
    }
}
