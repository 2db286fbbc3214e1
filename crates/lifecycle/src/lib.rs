//! # Meridian Trade Lifecycle
//!
//! Drives trades through the Pending -> Open -> Closed state machine
//! against incoming bars.
//!
//! ## Architectural Principles
//!
//! 1. **One mutator.** Only the [`TradeManager`] asks the ledger to open or
//!    close positions, so every transition is observable in one file.
//! 2. **Size at the fill, not the signal.** A pending trade has no quantity;
//!    the position sizer runs at the instant the entry price trades, against
//!    whatever equity basis the configured sizing mode selects.
//! 3. **Skippable versus fatal.** Bad signals and unfundable fills are
//!    logged and dropped; the run continues. Structural violations from the
//!    ledger propagate and abort the run.
//!
//! ## Public API
//!
//! - [`TradeManager`]: submit signals, process bars, finalize the run.
//! - [`LifecycleError`]: fatal errors only; rejections are not errors.

pub mod error;
pub mod manager;

pub use error::LifecycleError;
pub use manager::TradeManager;
