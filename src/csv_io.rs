use accountant::{SignalSource, SymbolSeries};
use analytics::PerformanceReport;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use core_types::{Bar, EquityCurve, Side, Signal, Trade};
use csv::StringRecord;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use tracing::info;

// ==============================================================================
// Bar Data Loading
// ==============================================================================

/// Loads every `<SYMBOL>.csv` file in a directory as one symbol's bar series.
///
/// The file stem is taken verbatim as the symbol name. Series come back
/// sorted by symbol so the run's universe is independent of directory
/// enumeration order.
pub fn load_bar_directory(dir: &Path) -> Result<Vec<SymbolSeries>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read data directory {}", dir.display()))?;

    let mut series = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("csv") {
            continue;
        }
        let Some(symbol) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let bars = load_bar_file(&path)?;
        info!("Loaded {} bars for {}", bars.len(), symbol);
        series.push(SymbolSeries {
            symbol: symbol.to_string(),
            bars,
        });
    }

    if series.is_empty() {
        bail!("no .csv bar files found in {}", dir.display());
    }
    series.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    Ok(series)
}

/// Parses one `timestamp,open,high,low,close,volume` file.
fn load_bar_file(path: &Path) -> Result<Vec<Bar>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut bars = Vec::new();
    for (index, result) in reader.records().enumerate() {
        // The header occupies row 1.
        let row = index + 2;
        let record =
            result.with_context(|| format!("{}: row {} is not valid CSV", path.display(), row))?;
        let bar = parse_bar(&record)
            .with_context(|| format!("{}: row {}", path.display(), row))?;
        bars.push(bar);
    }
    Ok(bars)
}

fn parse_bar(record: &StringRecord) -> Result<Bar> {
    Ok(Bar {
        timestamp: parse_timestamp(record, 0)?,
        open: parse_decimal(record, 1, "open")?,
        high: parse_decimal(record, 2, "high")?,
        low: parse_decimal(record, 3, "low")?,
        close: parse_decimal(record, 4, "close")?,
        volume: parse_decimal(record, 5, "volume")?,
    })
}

// ==============================================================================
// Signal Loading
// ==============================================================================

/// A signal row waiting for its release time.
#[derive(Debug, Clone)]
pub struct TimedSignal {
    pub due: DateTime<Utc>,
    pub signal: Signal,
}

/// Replays a pre-recorded signal file through the [`SignalSource`] seam.
///
/// Each row fires at the first bar of its symbol at or after the row's
/// timestamp, and at most one row fires per bar.
#[derive(Debug, Default)]
pub struct CsvSignalSource {
    queue: VecDeque<TimedSignal>,
}

impl CsvSignalSource {
    pub fn new(mut signals: Vec<TimedSignal>) -> Self {
        // Stable: rows sharing a timestamp keep their file order.
        signals.sort_by_key(|timed| timed.due);
        Self {
            queue: signals.into(),
        }
    }
}

impl SignalSource for CsvSignalSource {
    fn evaluate(&mut self, bar: &Bar) -> Option<Signal> {
        if self
            .queue
            .front()
            .is_some_and(|next| next.due <= bar.timestamp)
        {
            return self.queue.pop_front().map(|timed| timed.signal);
        }
        None
    }
}

/// Loads a `timestamp,symbol,side,entry,stop,target` file and groups the
/// rows into one replay source per symbol.
pub fn load_signal_file(path: &Path) -> Result<HashMap<String, CsvSignalSource>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut grouped: HashMap<String, Vec<TimedSignal>> = HashMap::new();
    let mut total = 0usize;
    for (index, result) in reader.records().enumerate() {
        let row = index + 2;
        let record =
            result.with_context(|| format!("{}: row {} is not valid CSV", path.display(), row))?;
        let timed = parse_signal(&record)
            .with_context(|| format!("{}: row {}", path.display(), row))?;
        grouped
            .entry(timed.signal.symbol.clone())
            .or_default()
            .push(timed);
        total += 1;
    }

    info!("Loaded {} signals across {} symbols", total, grouped.len());
    Ok(grouped
        .into_iter()
        .map(|(symbol, signals)| (symbol, CsvSignalSource::new(signals)))
        .collect())
}

fn parse_signal(record: &StringRecord) -> Result<TimedSignal> {
    let symbol = field(record, 1, "symbol")?.trim();
    if symbol.is_empty() {
        bail!("empty symbol");
    }
    Ok(TimedSignal {
        due: parse_timestamp(record, 0)?,
        signal: Signal {
            symbol: symbol.to_string(),
            side: parse_side(record, 2)?,
            entry_price: parse_decimal(record, 3, "entry")?,
            stop_price: parse_decimal(record, 4, "stop")?,
            target_price: parse_decimal(record, 5, "target")?,
        },
    })
}

// ==============================================================================
// Field Parsers
// ==============================================================================

fn field<'a>(record: &'a StringRecord, index: usize, name: &str) -> Result<&'a str> {
    record
        .get(index)
        .with_context(|| format!("missing {name} column"))
}

fn parse_decimal(record: &StringRecord, index: usize, name: &str) -> Result<Decimal> {
    let raw = field(record, index, name)?.trim();
    raw.parse()
        .with_context(|| format!("invalid {name} value: {raw}"))
}

fn parse_timestamp(record: &StringRecord, index: usize) -> Result<DateTime<Utc>> {
    let raw = field(record, index, "timestamp")?.trim();
    let parsed = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("invalid RFC 3339 timestamp: {raw}"))?;
    Ok(parsed.with_timezone(&Utc))
}

fn parse_side(record: &StringRecord, index: usize) -> Result<Side> {
    let raw = field(record, index, "side")?.trim();
    match raw.to_ascii_lowercase().as_str() {
        "long" => Ok(Side::Long),
        "short" => Ok(Side::Short),
        other => bail!("invalid side value: {other} (expected long or short)"),
    }
}

// ==============================================================================
// Result Exports
// ==============================================================================

/// Writes the closed-trade history as CSV.
pub fn write_trades_csv(path: &Path, trades: &[Trade]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record([
        "id",
        "symbol",
        "side",
        "units",
        "entry_price",
        "exit_price",
        "opened_at",
        "closed_at",
        "close_reason",
        "realized_pnl",
    ])?;
    for trade in trades {
        writer.write_record([
            trade.id.to_string(),
            trade.symbol.clone(),
            format!("{:?}", trade.side),
            opt_decimal(trade.filled_units()),
            trade.entry_price.to_string(),
            opt_decimal(trade.exit_price()),
            opt_time(trade.opened_at()),
            opt_time(trade.closed_at()),
            trade
                .close_reason()
                .map(|reason| format!("{reason:?}"))
                .unwrap_or_default(),
            opt_decimal(trade.realized_pnl()),
        ])?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Writes the equity curve as `timestamp,equity` CSV.
pub fn write_equity_csv(path: &Path, curve: &EquityCurve) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record(["timestamp", "equity"])?;
    for point in curve.points() {
        writer.write_record([point.timestamp.to_rfc3339(), point.equity.to_string()])?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Writes the performance report as pretty-printed JSON.
pub fn write_report_json(path: &Path, report: &PerformanceReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn opt_decimal(value: Option<Decimal>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn opt_time(value: Option<DateTime<Utc>>) -> String {
    value.map(|t| t.to_rfc3339()).unwrap_or_default()
}
