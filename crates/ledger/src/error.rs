use core_types::CoreError;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Symbol {0} already has an open position.")]
    DuplicateOpenPosition(String),

    #[error("Symbol {0} has no open position to close.")]
    NoOpenPosition(String),

    #[error("Trade {0} handed to the ledger is not in the open state.")]
    NotAnOpenTrade(Uuid),

    #[error("Trade {0} came back from close without a realized P&L.")]
    NotAClosedTrade(Uuid),

    #[error("Cash flow amount must be positive, got {0}.")]
    InvalidCashFlow(Decimal),

    #[error("Withdrawal of {requested} exceeds available cash of {available}.")]
    InsufficientCash {
        requested: Decimal,
        available: Decimal,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}
