//! End-to-end runs exercising the two sizing modes.
//!
//! Tests cover:
//! - Compounding: sequential wins multiply, so the final equity is the
//!   starting capital times the product of per-trade growth factors.
//! - Isolated: per-symbol results are independent, so a combined run earns
//!   exactly the sum of the single-symbol runs.
//! - Compounding across symbols: one symbol's open profit inflates the
//!   other's sizing basis, so the combined run diverges from the solo sum.

use accountant::{merge_streams, PortfolioAccountant, SignalSource, SymbolSeries};
use analytics::PerformanceReport;
use chrono::{DateTime, Duration, TimeZone, Utc};
use configuration::{
    Account, Config, Execution, Instrument, RiskManagement, SizingMode, TieBreak,
};
use core_types::{Bar, Side, Signal};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};

/// Replays scripted signals, each released by the first bar at or after
/// its scheduled time.
struct ScriptedSource {
    script: VecDeque<(DateTime<Utc>, Signal)>,
}

impl SignalSource for ScriptedSource {
    fn evaluate(&mut self, bar: &Bar) -> Option<Signal> {
        if self
            .script
            .front()
            .is_some_and(|(at, _)| *at <= bar.timestamp)
        {
            return self.script.pop_front().map(|(_, signal)| signal);
        }
        None
    }
}

fn ts(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap() + Duration::minutes(minute)
}

fn bar(minute: i64, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Bar {
    Bar {
        timestamp: ts(minute),
        open,
        high,
        low,
        close,
        volume: dec!(1000),
    }
}

fn long_signal(symbol: &str, entry: Decimal, stop: Decimal, target: Decimal) -> Signal {
    Signal {
        symbol: symbol.to_string(),
        side: Side::Long,
        entry_price: entry,
        stop_price: stop,
        target_price: target,
    }
}

fn config(mode: SizingMode, allocations: &[(&str, Decimal)]) -> Config {
    Config {
        account: Account {
            starting_capital: dec!(100000),
        },
        risk_management: RiskManagement {
            risk_per_trade_pct: dec!(0.01),
            sizing_mode: mode,
            allocations: if allocations.is_empty() {
                None
            } else {
                Some(
                    allocations
                        .iter()
                        .map(|(symbol, amount)| (symbol.to_string(), *amount))
                        .collect(),
                )
            },
        },
        instrument: Instrument {
            min_units: dec!(1),
            lot_step: dec!(1),
        },
        execution: Execution {
            tie_break: TieBreak::StopFirst,
        },
    }
}

/// Builds the master stream and sources from per-symbol inputs and runs
/// the whole simulation.
fn simulate(
    config: &Config,
    inputs: Vec<(&str, Vec<Bar>, Vec<(i64, Signal)>)>,
) -> (PortfolioAccountant, PerformanceReport) {
    let mut series = Vec::new();
    let mut sources: HashMap<String, Box<dyn SignalSource>> = HashMap::new();
    for (symbol, bars, script) in inputs {
        series.push(SymbolSeries {
            symbol: symbol.to_string(),
            bars,
        });
        sources.insert(
            symbol.to_string(),
            Box::new(ScriptedSource {
                script: script
                    .into_iter()
                    .map(|(minute, signal)| (ts(minute), signal))
                    .collect(),
            }),
        );
    }
    let events = merge_streams(series).unwrap();
    let mut accountant = PortfolioAccountant::new(config, sources).unwrap();
    let report = accountant.run(&events).unwrap();
    (accountant, report)
}

fn total_realized(accountant: &PortfolioAccountant) -> Decimal {
    accountant
        .closed_trades()
        .iter()
        .map(|trade| trade.realized_pnl().unwrap())
        .sum()
}

/// Signal at bar 0, fill at 100 on bar 1, take-profit at 102 on bar 2.
fn acme_winning_bars() -> Vec<Bar> {
    vec![
        bar(0, dec!(100.5), dec!(101), dec!(100.2), dec!(100.8)),
        bar(1, dec!(100.4), dec!(100.6), dec!(99.8), dec!(100.1)),
        bar(2, dec!(100.2), dec!(102.3), dec!(100), dec!(102)),
    ]
}

/// Signal at bar 0, fill at 200 on bar 1, stop-loss at 199 on bar 2.
fn zeta_losing_bars() -> Vec<Bar> {
    vec![
        bar(0, dec!(200.5), dec!(201), dec!(200.2), dec!(200.8)),
        bar(1, dec!(200.4), dec!(200.6), dec!(199.8), dec!(200.2)),
        bar(2, dec!(199.5), dec!(199.8), dec!(198.9), dec!(199.2)),
    ]
}

fn acme_signal() -> Signal {
    long_signal("ACME", dec!(100), dec!(99), dec!(102))
}

fn zeta_signal() -> Signal {
    long_signal("ZETA", dec!(200), dec!(199), dec!(204))
}

#[test]
fn compounding_growth_multiplies_across_sequential_trades() {
    // Two identical winners back to back. Each risks 1% over a 1-point
    // stop and takes profit 2 points higher, returning 2% of the equity
    // it was sized against.
    let bars = vec![
        bar(0, dec!(100.5), dec!(101), dec!(100.2), dec!(100.8)),
        bar(1, dec!(100.4), dec!(100.6), dec!(99.8), dec!(100.1)),
        bar(2, dec!(100.2), dec!(102.3), dec!(100), dec!(102)),
        bar(3, dec!(101), dec!(101.5), dec!(100.6), dec!(101)),
        bar(4, dec!(100.8), dec!(101), dec!(99.9), dec!(100.3)),
        bar(5, dec!(102.5), dec!(102.6), dec!(101.8), dec!(102.2)),
    ];
    let script = vec![(0, acme_signal()), (3, acme_signal())];

    let (accountant, report) = simulate(
        &config(SizingMode::Compounding, &[]),
        vec![("ACME", bars, script)],
    );

    let trades = accountant.closed_trades();
    assert_eq!(trades.len(), 2);
    // The first fill is sized off 100,000, the second off 102,000.
    assert_eq!(trades[0].filled_units(), Some(dec!(1000)));
    assert_eq!(trades[1].filled_units(), Some(dec!(1020)));

    // Each trade returned exactly 2% of the equity it was sized against.
    let mut equity = dec!(100000);
    for trade in trades {
        let pnl = trade.realized_pnl().unwrap();
        assert_eq!(pnl / equity, dec!(0.02));
        equity += pnl;
    }

    // 100,000 * 1.02 * 1.02
    assert_eq!(equity, dec!(104040));
    assert_eq!(accountant.ledger().current_equity(), dec!(104040));
    assert_eq!(report.total_trades, 2);
    // One point per event plus the final sweep point.
    assert_eq!(accountant.equity_curve().len(), 7);
}

#[test]
fn isolated_results_add_across_symbols() {
    let allocations = [("ACME", dec!(50000)), ("ZETA", dec!(50000))];

    let (combined, _) = simulate(
        &config(SizingMode::Isolated, &allocations),
        vec![
            ("ACME", acme_winning_bars(), vec![(0, acme_signal())]),
            ("ZETA", zeta_losing_bars(), vec![(0, zeta_signal())]),
        ],
    );

    // Each symbol sizes off its fixed 50,000 slice: 500 units each.
    for trade in combined.closed_trades() {
        assert_eq!(trade.filled_units(), Some(dec!(500)));
    }
    // ACME wins 2 points * 500, ZETA loses 1 point * 500.
    assert_eq!(total_realized(&combined), dec!(500));

    // The same symbols run alone, each with its own fixed slice.
    let (acme_solo, _) = simulate(
        &config(SizingMode::Isolated, &allocations[..1]),
        vec![("ACME", acme_winning_bars(), vec![(0, acme_signal())])],
    );
    let (zeta_solo, _) = simulate(
        &config(SizingMode::Isolated, &allocations[1..]),
        vec![("ZETA", zeta_losing_bars(), vec![(0, zeta_signal())])],
    );

    assert_eq!(total_realized(&acme_solo), dec!(1000));
    assert_eq!(total_realized(&zeta_solo), dec!(-500));
    assert_eq!(
        total_realized(&combined),
        total_realized(&acme_solo) + total_realized(&zeta_solo)
    );
}

#[test]
fn compounding_couples_symbols_through_shared_equity() {
    let inputs = || {
        vec![
            ("ACME", acme_winning_bars(), vec![(0, acme_signal())]),
            ("ZETA", zeta_losing_bars(), vec![(0, zeta_signal())]),
        ]
    };

    let (combined, _) = simulate(&config(SizingMode::Compounding, &[]), inputs());

    // ACME fills first on bar 1 and is marked at 100.1 before ZETA's bar
    // arrives, so ZETA sizes off 100,100 and opens 1,001 units instead of
    // the 1,000 it would open alone.
    let zeta_trade = combined
        .closed_trades()
        .iter()
        .find(|trade| trade.symbol == "ZETA")
        .unwrap();
    assert_eq!(zeta_trade.filled_units(), Some(dec!(1001)));
    assert_eq!(total_realized(&combined), dec!(999));

    let (acme_solo, _) = simulate(
        &config(SizingMode::Compounding, &[]),
        vec![("ACME", acme_winning_bars(), vec![(0, acme_signal())])],
    );
    let (zeta_solo, _) = simulate(
        &config(SizingMode::Compounding, &[]),
        vec![("ZETA", zeta_losing_bars(), vec![(0, zeta_signal())])],
    );

    let solo_sum = total_realized(&acme_solo) + total_realized(&zeta_solo);
    assert_eq!(solo_sum, dec!(1000));
    // A shared pool is order-dependent: the combined run is not the sum
    // of its parts.
    assert_ne!(total_realized(&combined), solo_sum);
}
