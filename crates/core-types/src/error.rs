use crate::enums::TradeStatus;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("Cannot {attempted} trade {trade_id}: it is {current:?}")]
    InvalidTransition {
        trade_id: Uuid,
        current: TradeStatus,
        attempted: &'static str,
    },
}
