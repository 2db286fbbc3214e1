use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Sizing parameters from configuration are invalid: {0}")]
    InvalidParameters(String),

    #[error("Stop distance between entry {entry} and stop {stop} is not positive.")]
    InvalidStopDistance { entry: Decimal, stop: Decimal },

    #[error("Equity of {equity} cannot fund a tradable quantity under the risk rules.")]
    InsufficientCapital { equity: Decimal },
}
