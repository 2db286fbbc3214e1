//! # Meridian Portfolio Accountant
//!
//! The top-level orchestrator. It merges per-symbol bar series into one
//! chronological event stream and drives the shared ledger and trade
//! lifecycle through it, one event at a time.
//!
//! ## Architectural Principles
//!
//! 1. **Master Clock.** All symbols advance through a single merged stream
//!    sorted by timestamp. No component ever sees time move backwards.
//! 2. **One equity point per event.** After every processed event the
//!    accountant asks the ledger for `current_equity()` and appends it to
//!    the curve. The accountant never computes equity itself.
//! 3. **Deterministic replay.** Same bars, same signals, same configuration
//!    produce the same trades, the same curve and the same report.
//!
//! ## Public API
//!
//! - [`PortfolioAccountant`]: build from config and signal sources, then
//!   [`run`](PortfolioAccountant::run) or [`step`](PortfolioAccountant::step).
//! - [`merge_streams`]: turn per-symbol series into the master stream.
//! - [`StopToken`]: cooperative cancellation from another thread.
//! - [`SignalSource`]: the seam strategies plug into.

pub mod error;
pub mod events;
pub mod manager;
pub mod stop;

pub use error::AccountantError;
pub use events::{merge_streams, MarketEvent, SymbolSeries};
pub use manager::{PortfolioAccountant, SignalSource};
pub use stop::StopToken;
