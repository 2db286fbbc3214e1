//! # Meridian Risk Sizing
//!
//! Pure position-sizing arithmetic for the engine. Given an equity figure,
//! a risk fraction and the entry/stop geometry of a proposed trade, the
//! [`PositionSizer`] answers one question: how many units may this trade be,
//! so that a stop-out loses exactly the configured fraction of equity?
//!
//! The crate deliberately has no account state and no market access. Which
//! equity figure to size against (the live shared pool, or a fixed slice of
//! starting capital) is the caller's policy decision.

pub mod error;
pub mod sizer;

pub use error::RiskError;
pub use sizer::PositionSizer;
