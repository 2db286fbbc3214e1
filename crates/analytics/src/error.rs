use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Trade {0} is not closed; only completed trades can be analyzed.")]
    IncompleteTrade(Uuid),

    #[error("An unexpected error occurred during analytics calculation: {0}")]
    InternalError(String),
}
