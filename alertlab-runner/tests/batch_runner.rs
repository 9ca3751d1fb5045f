//! End-to-end batch runs: backtest file on disk → candle CSVs → report.

use std::path::{Path, PathBuf};

use alertlab_core::domain::ExitReason;
use alertlab_core::engine::{NoTradeReason, RunOutcome};
use alertlab_runner::{
    build_jobs, run_backtest_file, run_batch, BacktestFile, BatchOptions, RunError,
};

// ── Fixtures ─────────────────────────────────────────────────────────

/// 2024-03-01T12:00:00Z
const T0: i64 = 1_709_294_400;

const PEPE: [(f64, f64, f64, f64); 5] = [
    (1.0, 1.0, 1.0, 1.0),
    (1.0, 1.5, 1.0, 1.5),
    (1.5, 2.2, 1.5, 2.0),
    (2.0, 2.0, 1.2, 1.3),
    (1.3, 1.4, 1.2, 1.2),
];

const BACKTEST: &str = r#"
candles_dir = "data"

[strategies.hold]

[strategies.scalp]
profit_targets = [{ multiple = 2.0, fraction = 1.0 }]
stop_loss = { initial_pct = -0.2 }

[[alerts]]
id = "a-1"
token = "PEPE"
alert_time = "2024-03-01T12:00:00Z"
candles = "pepe.csv"

[[alerts]]
id = "a-2"
token = "PEPE"
alert_time = "2024-03-01T12:01:30Z"
candles = "pepe.csv"
strategies = ["hold"]

[[alerts]]
id = "late"
token = "PEPE"
alert_time = "2024-03-01T13:00:00Z"
candles = "pepe.csv"
strategies = ["hold"]
"#;

fn write_candles(path: &Path, rows: &[(f64, f64, f64, f64)], reverse: bool) {
    let mut lines: Vec<String> = rows
        .iter()
        .enumerate()
        .map(|(i, (o, h, l, c))| format!("{},{o},{h},{l},{c},100", T0 + i as i64 * 60))
        .collect();
    if reverse {
        lines.reverse();
    }
    let body = format!("timestamp,open,high,low,close,volume\n{}\n", lines.join("\n"));
    std::fs::write(path, body).unwrap();
}

fn setup(backtest: &str, reverse: bool) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("data")).unwrap();
    write_candles(&dir.path().join("data/pepe.csv"), &PEPE, reverse);
    let path = dir.path().join("backtest.toml");
    std::fs::write(&path, backtest).unwrap();
    (dir, path)
}

// ── Tests ────────────────────────────────────────────────────────────

#[test]
fn runs_every_alert_strategy_pair() {
    let (_dir, path) = setup(BACKTEST, false);
    let report = run_backtest_file(&path, None, BatchOptions::default()).unwrap();

    let keys: Vec<(&str, &str)> = report
        .jobs
        .iter()
        .map(|j| (j.alert_id.as_str(), j.strategy.as_str()))
        .collect();
    assert_eq!(
        keys,
        vec![("a-1", "hold"), ("a-1", "scalp"), ("a-2", "hold"), ("late", "hold")]
    );

    // Hold from the alert candle to the last close
    assert!((report.jobs[0].result.final_pnl_multiplier - 1.2).abs() < 1e-12);
    // Target at 2.0 fills on the third candle
    let scalp = &report.jobs[1].result;
    assert!((scalp.final_pnl_multiplier - 2.0).abs() < 1e-12);
    assert_eq!(scalp.exit_reasons(), vec![ExitReason::TargetsDone]);
    // 12:01:30 starts on the 12:02 candle
    assert_eq!(report.jobs[2].start_index, 2);
    assert!((report.jobs[2].result.final_pnl_multiplier - 0.8).abs() < 1e-12);
    // Past the data: neutral no-trade
    assert_eq!(
        report.jobs[3].result.outcome,
        RunOutcome::NoTrade(NoTradeReason::StartOutOfRange)
    );
}

#[test]
fn summaries_per_strategy() {
    let (_dir, path) = setup(BACKTEST, false);
    let report = run_backtest_file(&path, None, BatchOptions::default()).unwrap();

    let hold = report.summary("hold").unwrap();
    assert_eq!(hold.runs, 3);
    assert_eq!(hold.traded, 2);
    assert!((hold.mean_multiplier.unwrap() - 1.0).abs() < 1e-12);
    assert!((hold.median_multiplier.unwrap() - 1.0).abs() < 1e-12);
    assert_eq!(hold.win_rate, Some(0.5));
    assert_eq!(hold.total_trades, 2);

    let scalp = report.summary("scalp").unwrap();
    assert_eq!(scalp.runs, 1);
    assert_eq!(scalp.win_rate, Some(1.0));
}

#[test]
fn parallel_matches_sequential() {
    let (dir, path) = setup(BACKTEST, false);
    let file = BacktestFile::from_path(&path).unwrap();
    let jobs = build_jobs(&file, dir.path()).unwrap();

    let parallel = run_batch(&jobs, BatchOptions { parallel: true });
    let sequential = run_batch(&jobs, BatchOptions { parallel: false });
    assert_eq!(parallel, sequential);
}

#[test]
fn strategy_filter_narrows_jobs() {
    let (_dir, path) = setup(BACKTEST, false);
    let report = run_backtest_file(&path, Some("scalp"), BatchOptions::default()).unwrap();
    assert_eq!(report.jobs.len(), 1);
    assert_eq!(report.summaries.len(), 1);

    let err = run_backtest_file(&path, Some("nope"), BatchOptions::default()).unwrap_err();
    assert!(matches!(err, RunError::UnknownStrategy(ref s) if s == "nope"));
}

#[test]
fn canonicalized_file_matches_sorted_file() {
    let canonical = format!("canonicalize = true\n{BACKTEST}");
    let (_a, sorted_path) = setup(BACKTEST, false);
    let (_b, reversed_path) = setup(&canonical, true);

    let sorted = run_backtest_file(&sorted_path, None, BatchOptions::default()).unwrap();
    let reversed = run_backtest_file(&reversed_path, None, BatchOptions::default()).unwrap();
    let multipliers = |r: &alertlab_runner::BatchReport| -> Vec<f64> {
        r.jobs.iter().map(|j| j.result.final_pnl_multiplier).collect()
    };
    assert_eq!(multipliers(&sorted), multipliers(&reversed));
}

#[test]
fn invalid_strategy_fails_before_loading() {
    let bad = BACKTEST.replace("initial_pct = -0.2", "initial_pct = 0.2");
    let (_dir, path) = setup(&bad, false);
    let err = run_backtest_file(&path, None, BatchOptions::default()).unwrap_err();
    assert!(err.to_string().contains("scalp"));
}

#[test]
fn missing_backtest_file_is_reported() {
    let err = run_backtest_file(
        Path::new("/definitely/not/here.toml"),
        None,
        BatchOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, RunError::File(_)));
}
