pub mod enums;
pub mod error;
pub mod structs;
pub mod trade;

// Re-export the core types to provide a clean public API.
pub use enums::{CloseReason, Side, TradeStatus};
pub use error::CoreError;
pub use structs::{Bar, EquityCurve, EquityPoint, Signal};
pub use trade::{Trade, TradeState};
