//! AlertLab CLI: run and check alert backtest files.
//!
//! Commands:
//! - `run`: run every (alert × strategy) pair in a backtest file, write the
//!   JSON report, print a summary line per strategy
//! - `check`: parse and validate a backtest file without loading candles

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use alertlab_runner::{run_backtest_file, BacktestFile, BatchOptions, BatchReport};

#[derive(Parser)]
#[command(
    name = "alertlab",
    about = "AlertLab CLI: trade simulation for crypto alert backtests"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest file.
    Run {
        /// Path to the backtest TOML file.
        #[arg(long)]
        config: PathBuf,

        /// Run jobs one at a time instead of on the thread pool.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Only run this strategy.
        #[arg(long)]
        strategy: Option<String>,

        /// Where to write the JSON report. Defaults to stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Parse and validate a backtest file.
    Check {
        /// Path to the backtest TOML file.
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alertlab_runner=info,alertlab_core=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            sequential,
            strategy,
            output,
        } => run_cmd(&config, sequential, strategy.as_deref(), output.as_deref()),
        Commands::Check { config } => check_cmd(&config),
    }
}

fn run_cmd(
    config: &Path,
    sequential: bool,
    strategy: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let options = BatchOptions {
        parallel: !sequential,
    };
    let report = run_backtest_file(config, strategy, options)
        .with_context(|| format!("running {}", config.display()))?;

    let json = report.to_json_pretty()?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("writing report to {}", path.display()))?;
            info!(path = %path.display(), jobs = report.jobs.len(), "report written");
        }
        None => println!("{json}"),
    }

    print_summary(&report);
    Ok(())
}

fn check_cmd(config: &Path) -> Result<()> {
    let file = BacktestFile::from_path(config)
        .with_context(|| format!("checking {}", config.display()))?;
    let pairs: usize = file
        .alerts
        .iter()
        .map(|entry| file.strategies_for(entry).len())
        .sum();
    eprintln!(
        "OK: {} strategies, {} alerts, {} jobs",
        file.strategies.len(),
        file.alerts.len(),
        pairs
    );
    Ok(())
}

/// One line per strategy, on stderr so stdout stays valid JSON.
fn print_summary(report: &BatchReport) {
    eprintln!();
    eprintln!("=== Batch Summary ===");
    for s in &report.summaries {
        eprintln!(
            "{:<16} runs {:>4}  traded {:>4}  trades {:>5}  mean {}  median {}  win {}",
            s.strategy,
            s.runs,
            s.traded,
            s.total_trades,
            fmt_multiplier(s.mean_multiplier),
            fmt_multiplier(s.median_multiplier),
            s.win_rate
                .map_or_else(|| "-".to_string(), |w| format!("{:.1}%", w * 100.0)),
        );
    }
}

fn fmt_multiplier(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |m| format!("{m:.3}x"))
}
