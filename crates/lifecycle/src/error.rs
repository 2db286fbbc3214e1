use core_types::CoreError;
use ledger::LedgerError;
use risk::RiskError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Isolated sizing requires an allocation for symbol {0}.")]
    MissingAllocation(String),

    #[error("Cannot construct the trade manager: {0}")]
    InvalidSetup(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Risk(#[from] RiskError),
}
