use crate::error::AnalyticsError;
use crate::report::PerformanceReport;
use chrono::Duration;
use core_types::{EquityCurve, Trade, TradeState};
use rust_decimal::{Decimal, MathematicalOps};
use tracing::debug;

/// A stateless calculator for deriving performance metrics from a finished run.
#[derive(Debug, Default)]
pub struct AnalyticsEngine {}

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The main entry point for calculating performance metrics.
    ///
    /// # Arguments
    ///
    /// * `trades` - A slice of all closed `Trade`s from a run.
    /// * `equity_curve` - The time series of account equity the run recorded.
    /// * `initial_capital` - The capital the run started with.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `PerformanceReport` or an `AnalyticsError`.
    /// A trade that is still pending or open is an `IncompleteTrade` error;
    /// callers are expected to hand over the closed history only.
    pub fn calculate(
        &self,
        trades: &[Trade],
        equity_curve: &EquityCurve,
        initial_capital: Decimal,
    ) -> Result<PerformanceReport, AnalyticsError> {
        let mut report = PerformanceReport::new();

        if trades.is_empty() {
            // If there are no trades, many metrics are zero or undefined.
            // Return a default report, which is mostly zeroed out.
            return Ok(report);
        }

        self.calculate_profitability(trades, initial_capital, &mut report)?;
        self.calculate_drawdown(equity_curve, &mut report)?;
        self.calculate_time_metrics(trades, &mut report)?;
        self.calculate_ratios(equity_curve, &mut report)?;

        debug!(
            "Calculated performance report over {} trades and {} equity points",
            trades.len(),
            equity_curve.len()
        );
        Ok(report)
    }

    /// Calculates all profitability-related metrics.
    fn calculate_profitability(
        &self,
        trades: &[Trade],
        initial_capital: Decimal,
        report: &mut PerformanceReport,
    ) -> Result<(), AnalyticsError> {
        report.total_trades = trades.len();

        for trade in trades {
            let pnl = realized_pnl(trade)?;

            report.total_net_profit += pnl;

            if pnl.is_sign_positive() {
                report.gross_profit += pnl;
                report.winning_trades += 1;
            } else {
                report.gross_loss += pnl.abs();
                report.losing_trades += 1;
            }
        }

        // --- Ratios ---
        if report.gross_loss > Decimal::ZERO {
            report.profit_factor = Some(report.gross_profit / report.gross_loss);
        }

        if report.total_trades > 0 {
            report.win_rate_pct = Some(
                (Decimal::from(report.winning_trades) / Decimal::from(report.total_trades))
                    * Decimal::from(100),
            );
        }

        if report.winning_trades > 0 {
            report.average_win = report.gross_profit / Decimal::from(report.winning_trades);
        }

        if report.losing_trades > 0 {
            report.average_loss = report.gross_loss / Decimal::from(report.losing_trades);
            if report.average_loss > Decimal::ZERO {
                report.payoff_ratio = Some(report.average_win / report.average_loss);
            }
        }

        if initial_capital > Decimal::ZERO {
            report.total_return_pct =
                (report.total_net_profit / initial_capital) * Decimal::from(100);
        }

        Ok(())
    }

    /// Calculates maximum drawdown from the equity curve.
    fn calculate_drawdown(
        &self,
        equity_curve: &EquityCurve,
        report: &mut PerformanceReport,
    ) -> Result<(), AnalyticsError> {
        let points = equity_curve.points();
        if points.is_empty() {
            return Ok(());
        }

        let mut max_drawdown = Decimal::ZERO;
        let mut peak_equity = points[0].equity;

        for point in points {
            if point.equity > peak_equity {
                peak_equity = point.equity;
            }
            let drawdown = peak_equity - point.equity;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }

        report.max_drawdown = max_drawdown;

        if peak_equity > Decimal::ZERO {
            report.max_drawdown_pct = (max_drawdown / peak_equity) * Decimal::from(100);
        }

        Ok(())
    }

    /// Calculates all ratio-based metrics like Sharpe and Calmar.
    fn calculate_ratios(
        &self,
        equity_curve: &EquityCurve,
        report: &mut PerformanceReport,
    ) -> Result<(), AnalyticsError> {
        // --- Calmar Ratio ---
        if report.max_drawdown_pct > Decimal::ZERO {
            report.calmar_ratio = Some(report.total_return_pct / report.max_drawdown_pct);
        }

        // --- Sharpe Ratio ---
        // 1. Calculate per-observation returns from the equity curve.
        let returns: Vec<Decimal> = equity_curve
            .points()
            .windows(2)
            .filter(|w| !w[0].equity.is_zero())
            .map(|w| (w[1].equity - w[0].equity) / w[0].equity)
            .collect();

        if returns.len() < 2 {
            report.sharpe_ratio = None;
            return Ok(());
        }

        // 2. Calculate the mean of returns.
        let returns_sum: Decimal = returns.iter().sum();
        let mean_return = returns_sum / Decimal::from(returns.len());

        // 3. Calculate the standard deviation of returns.
        let variance: Decimal = returns
            .iter()
            .map(|r| (*r - mean_return) * (*r - mean_return))
            .sum::<Decimal>()
            / Decimal::from(returns.len());

        if variance <= Decimal::ZERO {
            report.sharpe_ratio = None;
            return Ok(());
        }

        let std_dev = variance.sqrt().ok_or_else(|| {
            AnalyticsError::InternalError(
                "Failed to calculate square root for variance".to_string(),
            )
        })?;

        // 4. Calculate Sharpe (assuming risk-free rate is 0). The equity
        //    curve's observation spacing is whatever the bar spacing was, so
        //    this is the non-annualized figure.
        if std_dev > Decimal::ZERO {
            report.sharpe_ratio = Some(mean_return / std_dev);
        }

        Ok(())
    }

    /// Calculates time-based metrics.
    fn calculate_time_metrics(
        &self,
        trades: &[Trade],
        report: &mut PerformanceReport,
    ) -> Result<(), AnalyticsError> {
        if trades.is_empty() {
            return Ok(());
        }

        let mut total_duration_secs: i64 = 0;
        for trade in trades {
            total_duration_secs += holding_period(trade)?.num_seconds();
        }

        let avg_secs = total_duration_secs / trades.len() as i64;
        report.average_holding_period = Duration::seconds(avg_secs)
            .to_std()
            .unwrap_or_default();

        Ok(())
    }
}

/// The realized P&L a closed trade carries in its terminal state.
fn realized_pnl(trade: &Trade) -> Result<Decimal, AnalyticsError> {
    let TradeState::Closed { realized_pnl, .. } = &trade.state else {
        return Err(AnalyticsError::IncompleteTrade(trade.id));
    };
    Ok(*realized_pnl)
}

/// How long a closed trade was in the market.
fn holding_period(trade: &Trade) -> Result<Duration, AnalyticsError> {
    let TradeState::Closed {
        opened_at,
        closed_at,
        ..
    } = &trade.state
    else {
        return Err(AnalyticsError::IncompleteTrade(trade.id));
    };
    Ok(*closed_at - *opened_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use core_types::{CloseReason, Side, Signal};
    use rust_decimal_macros::dec;

    fn ts(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn closed_trade(
        units: Decimal,
        exit_price: Decimal,
        opened_minute: i64,
        closed_minute: i64,
    ) -> Trade {
        let signal = Signal {
            symbol: "ACME".to_string(),
            side: Side::Long,
            entry_price: dec!(100),
            stop_price: dec!(90),
            target_price: dec!(120),
        };
        Trade::from_signal(&signal, ts(0))
            .unwrap()
            .fill(ts(opened_minute), units, units)
            .unwrap()
            .close(exit_price, CloseReason::Manual, ts(closed_minute))
            .unwrap()
    }

    fn curve(equities: &[Decimal]) -> EquityCurve {
        let mut curve = EquityCurve::new();
        for (i, equity) in equities.iter().enumerate() {
            curve.record(ts(i as i64), *equity);
        }
        curve
    }

    #[test]
    fn no_trades_yields_a_zeroed_report() {
        let report = AnalyticsEngine::new()
            .calculate(&[], &curve(&[dec!(100000)]), dec!(100000))
            .unwrap();
        assert_eq!(report.total_trades, 0);
        assert_eq!(report.total_net_profit, Decimal::ZERO);
        assert_eq!(report.win_rate_pct, None);
        assert_eq!(report.profit_factor, None);
    }

    #[test]
    fn profitability_metrics_match_hand_computed_values() {
        // +2000 winner and -1000 loser on 100,000 of capital.
        let trades = vec![
            closed_trade(dec!(1000), dec!(102), 1, 2),
            closed_trade(dec!(1000), dec!(99), 3, 4),
        ];
        let report = AnalyticsEngine::new()
            .calculate(&trades, &curve(&[dec!(100000), dec!(101000)]), dec!(100000))
            .unwrap();

        assert_eq!(report.total_trades, 2);
        assert_eq!(report.winning_trades, 1);
        assert_eq!(report.losing_trades, 1);
        assert_eq!(report.total_net_profit, dec!(1000));
        assert_eq!(report.gross_profit, dec!(2000));
        assert_eq!(report.gross_loss, dec!(1000));
        assert_eq!(report.profit_factor, Some(dec!(2)));
        assert_eq!(report.win_rate_pct, Some(dec!(50)));
        assert_eq!(report.average_win, dec!(2000));
        assert_eq!(report.average_loss, dec!(1000));
        assert_eq!(report.payoff_ratio, Some(dec!(2)));
        assert_eq!(report.total_return_pct, dec!(1));
    }

    #[test]
    fn drawdown_tracks_the_running_peak() {
        let trades = vec![closed_trade(dec!(10), dec!(101), 1, 2)];
        let report = AnalyticsEngine::new()
            .calculate(
                &trades,
                &curve(&[dec!(100000), dec!(102000), dec!(99000), dec!(101000)]),
                dec!(100000),
            )
            .unwrap();
        // Peak 102,000 down to 99,000.
        assert_eq!(report.max_drawdown, dec!(3000));
        assert_eq!(report.max_drawdown_pct.round_dp(4), dec!(2.9412));
        assert!(report.calmar_ratio.is_some());
    }

    #[test]
    fn sharpe_is_undefined_for_a_flat_curve() {
        let trades = vec![closed_trade(dec!(10), dec!(100), 1, 2)];
        let report = AnalyticsEngine::new()
            .calculate(
                &trades,
                &curve(&[dec!(100000), dec!(100000), dec!(100000)]),
                dec!(100000),
            )
            .unwrap();
        assert_eq!(report.sharpe_ratio, None);
    }

    #[test]
    fn sharpe_is_computed_for_a_moving_curve() {
        let trades = vec![closed_trade(dec!(10), dec!(101), 1, 2)];
        let report = AnalyticsEngine::new()
            .calculate(
                &trades,
                &curve(&[dec!(100000), dec!(101000), dec!(100500), dec!(101500)]),
                dec!(100000),
            )
            .unwrap();
        assert!(report.sharpe_ratio.is_some());
    }

    #[test]
    fn open_trades_are_rejected() {
        let signal = Signal {
            symbol: "ACME".to_string(),
            side: Side::Long,
            entry_price: dec!(100),
            stop_price: dec!(90),
            target_price: dec!(120),
        };
        let open = Trade::from_signal(&signal, ts(0))
            .unwrap()
            .fill(ts(1), dec!(10), dec!(10))
            .unwrap();
        let err = AnalyticsEngine::new()
            .calculate(&[open], &curve(&[dec!(100000)]), dec!(100000))
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::IncompleteTrade(_)));
    }

    #[test]
    fn average_holding_period_serializes_as_humantime() {
        // One-hour and three-hour holds average out to two hours.
        let trades = vec![
            closed_trade(dec!(10), dec!(101), 0, 60),
            closed_trade(dec!(10), dec!(101), 60, 240),
        ];
        let report = AnalyticsEngine::new()
            .calculate(&trades, &curve(&[dec!(100000)]), dec!(100000))
            .unwrap();
        assert_eq!(
            report.average_holding_period,
            std::time::Duration::from_secs(7200)
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["average_holding_period"], "2h");
    }
}
