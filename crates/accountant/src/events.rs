use crate::error::AccountantError;
use core_types::Bar;
use std::collections::HashSet;
use tracing::info;

/// All bars for one symbol, in chronological order.
#[derive(Debug, Clone)]
pub struct SymbolSeries {
    pub symbol: String,
    pub bars: Vec<Bar>,
}

/// A single entry in the master chronological stream: one bar for one
/// symbol. The struct is deliberately small; the accountant routes on
/// `symbol` and hands `bar` down to the lifecycle manager.
#[derive(Debug, Clone)]
pub struct MarketEvent {
    pub symbol: String,
    pub bar: Bar,
}

/// Merges per-symbol bar series into a single event stream sorted by
/// timestamp. This is the "Master Clock" every run is driven from.
///
/// Each input series must already be in non-decreasing order; a backwards
/// timestamp is a data defect and aborts the merge. When two symbols share
/// a timestamp their events are ordered by symbol name, so a run is
/// reproducible regardless of the order the series arrive in. Bars of one
/// symbol sharing a timestamp keep their input order: the sort is stable.
pub fn merge_streams(series: Vec<SymbolSeries>) -> Result<Vec<MarketEvent>, AccountantError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for s in &series {
        if !seen.insert(s.symbol.as_str()) {
            return Err(AccountantError::DuplicateSeries(s.symbol.clone()));
        }
        for pair in s.bars.windows(2) {
            if pair[1].timestamp < pair[0].timestamp {
                return Err(AccountantError::OutOfOrderBars {
                    symbol: s.symbol.clone(),
                    timestamp: pair[1].timestamp,
                });
            }
        }
    }

    let symbol_count = seen.len();

    let total: usize = series.iter().map(|s| s.bars.len()).sum();
    let mut events = Vec::with_capacity(total);
    for s in series {
        let symbol = s.symbol;
        for bar in s.bars {
            events.push(MarketEvent {
                symbol: symbol.clone(),
                bar,
            });
        }
    }

    events.sort_by(|a, b| {
        a.bar
            .timestamp
            .cmp(&b.bar.timestamp)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });

    info!(
        "Merged {} symbol series into a master stream of {} events",
        symbol_count,
        events.len()
    );
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn ts(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn bar(minute: i64) -> Bar {
        Bar {
            timestamp: ts(minute),
            open: dec!(100),
            high: dec!(101),
            low: dec!(99),
            close: dec!(100.5),
            volume: dec!(1000),
        }
    }

    fn series(symbol: &str, minutes: &[i64]) -> SymbolSeries {
        SymbolSeries {
            symbol: symbol.to_string(),
            bars: minutes.iter().map(|m| bar(*m)).collect(),
        }
    }

    #[test]
    fn merge_orders_by_timestamp_then_symbol() {
        let events = merge_streams(vec![
            series("ZETA", &[0, 1, 3]),
            series("ACME", &[1, 2, 3]),
        ])
        .unwrap();

        let order: Vec<(i64, &str)> = events
            .iter()
            .map(|e| {
                let minute = (e.bar.timestamp - ts(0)).num_minutes();
                (minute, e.symbol.as_str())
            })
            .collect();

        assert_eq!(
            order,
            vec![
                (0, "ZETA"),
                (1, "ACME"),
                (1, "ZETA"),
                (2, "ACME"),
                (3, "ACME"),
                (3, "ZETA"),
            ]
        );
    }

    #[test]
    fn unsorted_series_is_rejected() {
        let err = merge_streams(vec![series("ACME", &[0, 2, 1])]).unwrap_err();
        assert!(matches!(
            err,
            AccountantError::OutOfOrderBars { ref symbol, timestamp }
                if symbol == "ACME" && timestamp == ts(1)
        ));
    }

    #[test]
    fn equal_timestamps_within_a_series_keep_their_input_order() {
        let mut bars = vec![bar(0), bar(1), bar(1)];
        bars[1].close = dec!(100.1);
        bars[2].close = dec!(100.2);
        let events = merge_streams(vec![SymbolSeries {
            symbol: "ACME".to_string(),
            bars,
        }])
        .unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(events[1].bar.timestamp, events[2].bar.timestamp);
        assert_eq!(events[1].bar.close, dec!(100.1));
        assert_eq!(events[2].bar.close, dec!(100.2));
    }

    #[test]
    fn duplicate_symbol_is_rejected() {
        let err = merge_streams(vec![series("ACME", &[0]), series("ACME", &[1])]).unwrap_err();
        assert!(matches!(
            err,
            AccountantError::DuplicateSeries(ref symbol) if symbol == "ACME"
        ));
    }

    #[test]
    fn no_series_yields_an_empty_stream() {
        assert!(merge_streams(vec![]).unwrap().is_empty());
    }
}
