use crate::error::ConfigError;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

/// The root configuration structure for the entire engine.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub account: Account,
    pub risk_management: RiskManagement,
    pub instrument: Instrument,
    pub execution: Execution,
}

/// The capital the run starts with.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    /// Cash in the account before the first bar.
    pub starting_capital: Decimal,
}

/// Contains parameters for trade-level risk management.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskManagement {
    /// The fraction of the sizing basis to risk on a single trade (e.g., 0.01 for 1%).
    pub risk_per_trade_pct: Decimal,
    /// How the sizing basis is chosen for each fill.
    pub sizing_mode: SizingMode,
    /// Fixed per-symbol capital slices for `isolated` mode. When absent, the
    /// starting capital is split equally across the run's symbols.
    #[serde(default)]
    pub allocations: Option<HashMap<String, Decimal>>,
}

/// Quantity rounding rules of the traded instrument class.
#[derive(Debug, Clone, Deserialize)]
pub struct Instrument {
    /// The smallest order the venue accepts, in units.
    pub min_units: Decimal,
    /// Order quantities must be a whole multiple of this step.
    pub lot_step: Decimal,
}

/// How ambiguous bars are resolved at execution time.
#[derive(Debug, Clone, Deserialize)]
pub struct Execution {
    /// Which exit wins when a single bar touches both the stop and the target.
    #[serde(default)]
    pub tie_break: TieBreak,
}

/// The equity basis used when sizing a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SizingMode {
    /// Size every trade off the live equity of the shared pool, so results
    /// compound across all symbols.
    Compounding,
    /// Size each symbol off a fixed slice of starting capital that never
    /// changes during the run.
    Isolated,
}

/// Resolution order when one bar touches both exit prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Pessimistic: assume the stop traded first.
    #[default]
    StopFirst,
    /// Optimistic: assume the target traded first.
    TargetFirst,
}

impl Config {
    /// Checks the cross-field invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account.starting_capital <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(
                "account.starting_capital must be positive".to_string(),
            ));
        }
        let risk = self.risk_management.risk_per_trade_pct;
        if risk <= Decimal::ZERO || risk > Decimal::ONE {
            return Err(ConfigError::ValidationError(
                "risk_management.risk_per_trade_pct must be in (0, 1]".to_string(),
            ));
        }
        if self.instrument.lot_step <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(
                "instrument.lot_step must be positive".to_string(),
            ));
        }
        if self.instrument.min_units < Decimal::ZERO {
            return Err(ConfigError::ValidationError(
                "instrument.min_units must not be negative".to_string(),
            ));
        }
        if let Some(allocations) = &self.risk_management.allocations {
            let mut total = Decimal::ZERO;
            for (symbol, amount) in allocations {
                if *amount <= Decimal::ZERO {
                    return Err(ConfigError::ValidationError(format!(
                        "risk_management.allocations.{symbol} must be positive"
                    )));
                }
                total += *amount;
            }
            if total > self.account.starting_capital {
                return Err(ConfigError::ValidationError(format!(
                    "risk_management.allocations sum to {total}, more than starting capital"
                )));
            }
        }
        Ok(())
    }
}
