use accountant::{merge_streams, PortfolioAccountant, SignalSource};
use analytics::PerformanceReport;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use configuration::load_config;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod csv_io;

/// The main entry point for the Meridian backtesting application.
fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => handle_run(args)?,
    }

    Ok(())
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// A shared-capital, multi-symbol trade accounting and backtesting engine.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded bars and signals through the accountant.
    Run(RunArgs),
}

#[derive(Parser)]
struct RunArgs {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Directory holding one `<SYMBOL>.csv` bar file per symbol.
    #[arg(long)]
    data_dir: PathBuf,

    /// The `timestamp,symbol,side,entry,stop,target` signal file to replay.
    #[arg(long)]
    signals: PathBuf,

    /// Where to write trades.csv, equity.csv and report.json (optional).
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

// ==============================================================================
// Run Command Logic
// ==============================================================================

/// Handles the orchestration of a full simulation run.
fn handle_run(args: RunArgs) -> Result<()> {
    let config = load_config(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config))?;

    let series = csv_io::load_bar_directory(&args.data_dir)?;
    let mut signal_sources = csv_io::load_signal_file(&args.signals)?;

    // The data directory defines the symbol universe; a signal for a symbol
    // without bars can never fire.
    let mut sources: HashMap<String, Box<dyn SignalSource>> = HashMap::new();
    for s in &series {
        let source = signal_sources.remove(&s.symbol).unwrap_or_default();
        sources.insert(s.symbol.clone(), Box::new(source));
    }
    for symbol in signal_sources.keys() {
        warn!("Ignoring signals for {}: no bar data supplied", symbol);
    }

    let events = merge_streams(series)?;
    info!("Replaying {} events", events.len());

    let mut accountant = PortfolioAccountant::new(&config, sources)?;
    let report = accountant.run(&events)?;

    print_report(&report);

    if let Some(dir) = args.output_dir {
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        csv_io::write_trades_csv(&dir.join("trades.csv"), accountant.closed_trades())?;
        csv_io::write_equity_csv(&dir.join("equity.csv"), accountant.equity_curve())?;
        csv_io::write_report_json(&dir.join("report.json"), &report)?;
        info!("Results written to {}", dir.display());
    }

    Ok(())
}

// ==============================================================================
// Report Rendering
// ==============================================================================

/// Prints the performance report as a terminal table.
fn print_report(report: &PerformanceReport) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Metric", "Value"]);

    table.add_row(vec![
        "Total Net Profit".to_string(),
        fmt_decimal(report.total_net_profit),
    ]);
    table.add_row(vec![
        "Gross Profit".to_string(),
        fmt_decimal(report.gross_profit),
    ]);
    table.add_row(vec![
        "Gross Loss".to_string(),
        fmt_decimal(report.gross_loss),
    ]);
    table.add_row(vec![
        "Profit Factor".to_string(),
        fmt_opt_decimal(report.profit_factor),
    ]);
    table.add_row(vec![
        "Total Return %".to_string(),
        fmt_decimal(report.total_return_pct),
    ]);
    table.add_row(vec![
        "Max Drawdown".to_string(),
        fmt_decimal(report.max_drawdown),
    ]);
    table.add_row(vec![
        "Max Drawdown %".to_string(),
        fmt_decimal(report.max_drawdown_pct),
    ]);
    table.add_row(vec![
        "Sharpe Ratio".to_string(),
        fmt_opt_decimal(report.sharpe_ratio),
    ]);
    table.add_row(vec![
        "Calmar Ratio".to_string(),
        fmt_opt_decimal(report.calmar_ratio),
    ]);
    table.add_row(vec![
        "Total Trades".to_string(),
        report.total_trades.to_string(),
    ]);
    table.add_row(vec![
        "Winning Trades".to_string(),
        report.winning_trades.to_string(),
    ]);
    table.add_row(vec![
        "Losing Trades".to_string(),
        report.losing_trades.to_string(),
    ]);
    table.add_row(vec![
        "Win Rate %".to_string(),
        fmt_opt_decimal(report.win_rate_pct),
    ]);
    table.add_row(vec![
        "Average Win".to_string(),
        fmt_decimal(report.average_win),
    ]);
    table.add_row(vec![
        "Average Loss".to_string(),
        fmt_decimal(report.average_loss),
    ]);
    table.add_row(vec![
        "Payoff Ratio".to_string(),
        fmt_opt_decimal(report.payoff_ratio),
    ]);
    table.add_row(vec![
        "Average Holding Period".to_string(),
        format!("{}s", report.average_holding_period.as_secs()),
    ]);

    println!("{table}");
}

fn fmt_decimal(value: Decimal) -> String {
    value.round_dp(2).to_string()
}

/// Ratios stay undefined (`n/a`) rather than pretending to be zero.
fn fmt_opt_decimal(value: Option<Decimal>) -> String {
    value
        .map(|v| v.round_dp(4).to_string())
        .unwrap_or_else(|| "n/a".to_string())
}
