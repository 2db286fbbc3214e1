//! # Meridian Equity Ledger
//!
//! The single source of truth for account state during a run. The ledger
//! owns cash and the set of open positions, and is the only component that
//! ever computes equity.
//!
//! ## Architectural Principles
//!
//! 1. **One equity formula, one place.** `current_equity()` is cash plus the
//!    sum of per-position unrealized P&L. No other component derives equity,
//!    so the figure cannot drift between call sites.
//! 2. **Cash is settled money only.** Opening a position does not debit cash
//!    (margin-style accounting); a close folds the realized P&L into cash
//!    exactly once. Unrealized P&L lives on the position and nowhere else,
//!    which makes double counting structurally impossible.
//! 3. **Custody, not policy.** The ledger accepts filled trades and closes
//!    them at the prices it is given. Deciding *when* to open or close
//!    belongs to the lifecycle layer above it.
//!
//! ## Public API
//!
//! - [`EquityLedger`]: cash, positions, equity, deposits and withdrawals.
//! - [`OpenPosition`]: a held trade with its latest mark.
//! - [`LedgerError`]: structural violations (duplicate or missing positions).

pub mod error;
pub mod ledger;

pub use error::LedgerError;
pub use ledger::{EquityLedger, OpenPosition};
