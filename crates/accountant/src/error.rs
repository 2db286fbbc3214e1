use analytics::AnalyticsError;
use chrono::{DateTime, Utc};
use ledger::LedgerError;
use lifecycle::LifecycleError;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AccountantError {
    #[error("Cannot run a simulation over an empty event stream.")]
    EmptyStream,

    #[error("Symbol {0} was supplied more than once in the input series.")]
    DuplicateSeries(String),

    #[error("Bars for symbol {symbol} are not in chronological order at {timestamp}.")]
    OutOfOrderBars {
        symbol: String,
        timestamp: DateTime<Utc>,
    },

    #[error("Event for {symbol} at {timestamp} moves the master clock backwards.")]
    OutOfOrderEvents {
        symbol: String,
        timestamp: DateTime<Utc>,
    },

    #[error("The run has been finalized; no further events can be processed.")]
    RunFinished,

    #[error("Account equity went negative ({equity}) at {timestamp}; the simulation is not solvent.")]
    NegativeEquity {
        timestamp: DateTime<Utc>,
        equity: Decimal,
    },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
}
