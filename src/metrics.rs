//! Metric extraction from strategy output.
//!
//! Three sources are understood, in order of preference:
//! the JSON result envelope a strategy writes to `RBI_RESULT_PATH`, the
//! backtesting.py statistics table, and free-form keyword scanning.

use regex::Regex;
use serde::Deserialize;
use std::error::Error as StdError;
use std::sync::LazyLock;

use crate::types::StrategyStats;

/// Signed decimal, optionally followed by a percent sign
static NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([-+]?\d+(?:\.\d+)?)\s*%?").unwrap());

/// Metrics recovered from one strategy run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedMetrics {
    pub return_pct: f64,
    pub sharpe: f64,
    pub win_rate_pct: f64,
    pub max_drawdown_pct: f64,
    pub trade_count: u32,
    /// Only a matched return figure marks the run as successful
    pub found_return: bool,
}

/// First number following `keyword` in an already lowercased line
fn value_after(line: &str, keyword: &str) -> Option<f64> {
    let pos = line.find(keyword)?;
    let rest = &line[pos + keyword.len()..];
    NUMBER_REGEX
        .captures(rest)
        .and_then(|caps| caps[1].parse::<f64>().ok())
}

/// Scan free-form text for return, Sharpe, win rate, drawdown and trade count.
///
/// Each line is lowercased and checked for the keywords `return`, `sharpe`,
/// `win`, `drawdown` and `trades`; the first number after a keyword is taken and
/// the first match per metric wins. Drawdown is stored as an absolute value.
/// Nothing here fails: unmatched metrics stay at zero.
pub fn extract_metrics(output: &str) -> ExtractedMetrics {
    let mut return_pct = None;
    let mut sharpe = None;
    let mut win_rate = None;
    let mut drawdown = None;
    let mut trades = None;

    for line in output.lines() {
        let lower = line.to_lowercase();
        if return_pct.is_none() {
            return_pct = value_after(&lower, "return");
        }
        if sharpe.is_none() {
            sharpe = value_after(&lower, "sharpe");
        }
        if win_rate.is_none() {
            win_rate = value_after(&lower, "win");
        }
        if drawdown.is_none() {
            drawdown = value_after(&lower, "drawdown");
        }
        if trades.is_none() {
            trades = value_after(&lower, "trades");
        }
    }

    ExtractedMetrics {
        return_pct: return_pct.unwrap_or(0.0),
        sharpe: sharpe.unwrap_or(0.0),
        win_rate_pct: win_rate.unwrap_or(0.0),
        max_drawdown_pct: drawdown.map(f64::abs).unwrap_or(0.0),
        trade_count: trades.map(|t| t.abs().round() as u32).unwrap_or(0),
        found_return: return_pct.is_some(),
    }
}

/// Structured result a strategy may write instead of relying on text scraping
#[derive(Debug, Deserialize)]
struct ResultEnvelope {
    return_pct: f64,
    #[serde(default)]
    sharpe: f64,
    #[serde(default)]
    win_rate_pct: f64,
    #[serde(default)]
    max_drawdown_pct: f64,
    #[serde(default)]
    trade_count: f64,
    #[serde(default)]
    buy_hold_pct: f64,
    #[serde(default)]
    sortino: f64,
    #[serde(default)]
    exposure_time_pct: f64,
    #[serde(default)]
    expectancy_pct: f64,
}

impl ResultEnvelope {
    fn trades(&self) -> u32 {
        self.trade_count.abs().round() as u32
    }
}

/// Parse the JSON result envelope; `return_pct` is required
pub fn parse_envelope(json: &str) -> Result<ExtractedMetrics, Box<dyn StdError>> {
    let env: ResultEnvelope = serde_json::from_str(json)?;
    Ok(ExtractedMetrics {
        return_pct: env.return_pct,
        sharpe: env.sharpe,
        win_rate_pct: env.win_rate_pct,
        max_drawdown_pct: env.max_drawdown_pct.abs(),
        trade_count: env.trades(),
        found_return: true,
    })
}

/// Parse the JSON result envelope into the extended statistics set
pub fn parse_envelope_stats(json: &str) -> Result<StrategyStats, Box<dyn StdError>> {
    let env: ResultEnvelope = serde_json::from_str(json)?;
    Ok(StrategyStats {
        return_pct: env.return_pct,
        buy_hold_pct: env.buy_hold_pct,
        max_drawdown_pct: env.max_drawdown_pct.abs(),
        sharpe: env.sharpe,
        sortino: env.sortino,
        exposure_time_pct: env.exposure_time_pct,
        expectancy_pct: env.expectancy_pct,
        trades: env.trades(),
    })
}

/// Value column of a backtesting.py stats line; NaN and inf count as zero
fn table_value(rest: &str) -> Option<f64> {
    let value = rest.split_whitespace().next()?.parse::<f64>().ok()?;
    Some(if value.is_finite() { value } else { 0.0 })
}

/// Parse the statistics block printed by backtesting.py.
///
/// Labels are matched exactly at the start of the trimmed line. Returns `None`
/// when no `Return [%]` line is present.
pub fn extract_stats_table(output: &str) -> Option<StrategyStats> {
    let mut stats = StrategyStats::default();
    let mut found_return = false;

    for line in output.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Return [%]") {
            if let Some(v) = table_value(rest) {
                stats.return_pct = v;
                found_return = true;
            }
        } else if let Some(rest) = line.strip_prefix("Buy & Hold Return [%]") {
            stats.buy_hold_pct = table_value(rest).unwrap_or(0.0);
        } else if let Some(rest) = line.strip_prefix("Max. Drawdown [%]") {
            stats.max_drawdown_pct = table_value(rest).unwrap_or(0.0).abs();
        } else if let Some(rest) = line.strip_prefix("Sharpe Ratio") {
            stats.sharpe = table_value(rest).unwrap_or(0.0);
        } else if let Some(rest) = line.strip_prefix("Sortino Ratio") {
            stats.sortino = table_value(rest).unwrap_or(0.0);
        } else if let Some(rest) = line.strip_prefix("Exposure Time [%]") {
            stats.exposure_time_pct = table_value(rest).unwrap_or(0.0);
        } else if let Some(rest) = line.strip_prefix("Expectancy [%]") {
            stats.expectancy_pct = table_value(rest).unwrap_or(0.0);
        } else if let Some(rest) = line.strip_prefix("# Trades") {
            stats.trades = table_value(rest).map(|t| t.abs().round() as u32).unwrap_or(0);
        }
    }

    found_return.then_some(stats)
}
