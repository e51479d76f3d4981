/// Display and formatting utilities for validator output
use chrono::Utc;
use colored::Colorize;

use crate::config::TimeframeConfig;
use crate::data::DatasetInfo;
use crate::gate::GateDecision;
use crate::types::{AggregateResult, DatasetRow, RunResult, RunStatus};

fn marker(passed: bool) -> String {
    if passed {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}

/// Format progress message for a completed strategy run
pub fn format_run_progress(strategy: &str, label: &str, completed: usize, total: usize) -> String {
    format!(
        "[{}] Finished '{}' [{}]: {} of {}",
        Utc::now().format("%H:%M:%S"),
        strategy,
        label,
        completed,
        total
    )
}

/// One-line summary of a timeframe result
pub fn format_run_result(result: &RunResult) -> String {
    if result.success {
        format!(
            "  {} {:<5} return {:>8.2}%  sharpe {:>6.2}  win {:>6.2}%  max dd {:>6.2}%  trades {:>4}  ({:.1}s)",
            marker(true),
            result.timeframe,
            result.return_pct,
            result.sharpe,
            result.win_rate_pct,
            result.max_drawdown_pct,
            result.trade_count,
            result.elapsed_secs
        )
    } else {
        format!(
            "  {} {:<5} {} ({:.1}s)",
            marker(false),
            result.timeframe,
            result.status.label().red(),
            result.elapsed_secs
        )
    }
}

/// Format error message for missing dataset files
pub fn format_missing_datasets(missing: &[String]) -> String {
    format!(
        "Missing dataset files, nothing was run:\n{}",
        missing
            .iter()
            .map(|m| format!("  - {}", m))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

/// Format a gate criterion with its marker
pub fn format_criterion(name: &str, passed: bool) -> String {
    format!("  {} {}", marker(passed), name)
}

pub fn format_verdict(decision: &GateDecision) -> String {
    if decision.pass_test {
        "PASS".green().bold().to_string()
    } else {
        format!("{} ({})", "FAIL".red().bold(), decision.failed_criteria().join(", "))
    }
}

pub fn print_aggregate_summary(result: &AggregateResult, timeframes: &[TimeframeConfig]) {
    let decision = GateDecision {
        all_profitable: result.all_profitable,
        all_positive_sharpe: result.all_positive_sharpe,
        weighted_return_good: result.weighted_return_good,
        pass_test: result.pass_test,
    };

    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║              MULTI-TIMEFRAME VALIDATION SUMMARY              ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!("  Strategy: {}", result.strategy_name);
    println!("  Tested at: {}", result.tested_at);

    println!("\n┌─ Timeframes ─────────────────────────────────────────────────┐");
    for tf in timeframes {
        match result.timeframe_results.get(&tf.id) {
            Some(r) => println!(
                "│  {:<5} w={:.2}  {:<22} return {:>8.2}%  sharpe {:>6.2}",
                tf.id, tf.weight, tf.label, r.return_pct, r.sharpe
            ),
            None => println!("│  {:<5} w={:.2}  {:<22} no result", tf.id, tf.weight, tf.label),
        }
    }
    println!("└──────────────────────────────────────────────────────────────┘");

    println!("\n┌─ Weighted Scores ({:?}) ", result.normalization);
    println!("│  Weighted Return:           {:>17.2}%", result.weighted_return);
    println!("│  Weighted Sharpe:           {:>17.3}", result.weighted_sharpe);
    println!("└──────────────────────────────────────────────────────────────┘");

    println!("\n┌─ Gate ───────────────────────────────────────────────────────┐");
    println!("{}", format_criterion("all timeframes profitable", result.all_profitable));
    println!("{}", format_criterion("all timeframes Sharpe above minimum", result.all_positive_sharpe));
    println!("{}", format_criterion("weighted return above minimum", result.weighted_return_good));
    println!("└──────────────────────────────────────────────────────────────┘");
    println!("\n  Verdict: {}\n", format_verdict(&decision));
}

pub fn print_dataset_matrix(strategy: &str, rows: &[(DatasetRow, RunStatus)]) {
    println!("\n┌─ Dataset matrix: {} ", strategy);
    println!(
        "│  {:<28} {:>9} {:>9} {:>8} {:>7} {:>7} {:>7}",
        "Data_Source", "Return_%", "B&H_%", "Max_DD_%", "Sharpe", "Sortino", "Trades"
    );
    for (row, status) in rows {
        if status.is_success() {
            println!(
                "│  {:<28} {:>9.2} {:>9.2} {:>8.2} {:>7.2} {:>7.2} {:>7}",
                row.data_source,
                row.return_pct,
                row.buy_hold_pct,
                row.max_drawdown_pct,
                row.sharpe,
                row.sortino,
                row.trades
            );
        } else {
            println!("│  {:<28} {} {}", row.data_source, marker(false), status.label().red());
        }
    }
    println!("└──────────────────────────────────────────────────────────────┘");
}

/// Smoke-test line for one configured dataset
pub fn format_dataset_check(tf: &TimeframeConfig, info: Option<&DatasetInfo>) -> String {
    match info {
        None => format!("  {} {:<5} {} (missing)", marker(false), tf.id, tf.file),
        Some(info) => {
            let mut notes = Vec::new();
            if !info.has_ohlcv() {
                notes.push(format!("missing columns: {}", info.missing_columns.join(", ")));
            }
            if info.rows < tf.min_candles {
                notes.push(format!("only {} candles, want {}", info.rows, tf.min_candles));
            }
            let ok = notes.is_empty();
            let detail = if ok {
                format!("{} candles", info.rows)
            } else {
                notes.join("; ").yellow().to_string()
            };
            format!("  {} {:<5} {} ({})", marker(ok), tf.id, tf.file, detail)
        }
    }
}

pub fn usage_hints() -> Vec<String> {
    vec![
        "Validate a strategy:   rbi_validator --strategy strategies/my_strategy.py".to_string(),
        "Run in parallel:       rbi_validator --strategy my_strategy.py --parallel 4".to_string(),
        "Dataset matrix:        multi_data_tester --strategy my_strategy.py".to_string(),
        "Strategies read the dataset path from $RBI_DATA_PATH and may write a JSON result to $RBI_RESULT_PATH".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_datasets_message() {
        let msg = format_missing_datasets(&["data/a.csv".to_string(), "data/b.csv".to_string()]);
        assert!(msg.contains("  - data/a.csv\n  - data/b.csv"));
    }

    #[test]
    fn test_failed_result_shows_status() {
        colored::control::set_override(false);
        let result = RunResult::failed("4h", RunStatus::Timeout, 120.0);
        let line = format_run_result(&result);
        assert!(line.contains("4h"));
        assert!(line.contains("timeout"));
    }

    #[test]
    fn test_dataset_check_flags_short_files() {
        colored::control::set_override(false);
        let tf = TimeframeConfig::new("1h", "BTC-USD-1h.csv", 90, 1500, 0.3, "swing");
        let info = DatasetInfo {
            path: "data/BTC-USD-1h.csv".to_string(),
            rows: 10,
            missing_columns: vec![],
        };
        let line = format_dataset_check(&tf, Some(&info));
        assert!(line.contains("only 10 candles, want 1500"));
        assert!(format_dataset_check(&tf, None).contains("missing"));
    }
}
