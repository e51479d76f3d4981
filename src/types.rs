// Result records produced by a validation run

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::WeightNormalization;
use crate::metrics::ExtractedMetrics;

/// How a single strategy run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// The process exited cleanly but no return figure could be found in its output
    ParseError,
    /// Non-zero exit or killed by a signal (exit_code is None then)
    StrategyFailure { exit_code: Option<i32> },
    Timeout,
    /// The interpreter could not be started or the temp files could not be written
    LaunchError { message: String },
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Short label used in console output
    pub fn label(&self) -> String {
        match self {
            Self::Success => "ok".to_string(),
            Self::ParseError => "no metrics in output".to_string(),
            Self::StrategyFailure { exit_code: Some(code) } => format!("exit code {}", code),
            Self::StrategyFailure { exit_code: None } => "terminated by signal".to_string(),
            Self::Timeout => "timeout".to_string(),
            Self::LaunchError { message } => format!("launch error: {}", message),
        }
    }
}

/// Metrics of one strategy run against one timeframe.
///
/// Any non-successful run carries all-zero metrics, so it contributes nothing to
/// weighted sums and fails every per-timeframe minimum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub timeframe: String,
    pub return_pct: f64,
    pub sharpe: f64,
    pub win_rate_pct: f64,
    pub max_drawdown_pct: f64,
    pub trade_count: u32,
    pub success: bool,
    pub status: RunStatus,
    pub elapsed_secs: f64,
}

impl RunResult {
    /// Build a result from extracted metrics; a missing return figure is a parse error
    pub fn from_metrics(timeframe: &str, metrics: &ExtractedMetrics, elapsed_secs: f64) -> Self {
        if !metrics.found_return {
            return Self::failed(timeframe, RunStatus::ParseError, elapsed_secs);
        }
        Self {
            timeframe: timeframe.to_string(),
            return_pct: metrics.return_pct,
            sharpe: metrics.sharpe,
            win_rate_pct: metrics.win_rate_pct,
            max_drawdown_pct: metrics.max_drawdown_pct.abs(),
            trade_count: metrics.trade_count,
            success: true,
            status: RunStatus::Success,
            elapsed_secs,
        }
    }

    pub fn failed(timeframe: &str, status: RunStatus, elapsed_secs: f64) -> Self {
        Self {
            timeframe: timeframe.to_string(),
            return_pct: 0.0,
            sharpe: 0.0,
            win_rate_pct: 0.0,
            max_drawdown_pct: 0.0,
            trade_count: 0,
            success: status.is_success(),
            status,
            elapsed_secs,
        }
    }
}

/// Outcome of a full multi-timeframe validation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub strategy_name: String,
    pub tested_at: String,
    pub normalization: WeightNormalization,
    pub timeframe_results: BTreeMap<String, RunResult>,
    pub weighted_return: f64,
    pub weighted_sharpe: f64,
    pub all_profitable: bool,
    pub all_positive_sharpe: bool,
    pub weighted_return_good: bool,
    pub pass_test: bool,
}

/// backtesting.py style statistics for the dataset-matrix report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyStats {
    pub return_pct: f64,
    pub buy_hold_pct: f64,
    pub max_drawdown_pct: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub exposure_time_pct: f64,
    pub expectancy_pct: f64,
    pub trades: u32,
}

impl From<&ExtractedMetrics> for StrategyStats {
    fn from(m: &ExtractedMetrics) -> Self {
        Self {
            return_pct: m.return_pct,
            max_drawdown_pct: m.max_drawdown_pct.abs(),
            sharpe: m.sharpe,
            trades: m.trade_count,
            ..Default::default()
        }
    }
}

/// One row of the dataset-matrix CSV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    #[serde(rename = "Data_Source")]
    pub data_source: String,
    #[serde(rename = "Return_%")]
    pub return_pct: f64,
    #[serde(rename = "Buy_Hold_%")]
    pub buy_hold_pct: f64,
    #[serde(rename = "Max_DD_%")]
    pub max_drawdown_pct: f64,
    #[serde(rename = "Sharpe")]
    pub sharpe: f64,
    #[serde(rename = "Sortino")]
    pub sortino: f64,
    #[serde(rename = "Exposure_Time_%")]
    pub exposure_time_pct: f64,
    #[serde(rename = "Expectancy_%")]
    pub expectancy_pct: f64,
    #[serde(rename = "Trades")]
    pub trades: u32,
}

impl DatasetRow {
    pub fn new(data_source: &str, stats: &StrategyStats) -> Self {
        Self {
            data_source: data_source.to_string(),
            return_pct: stats.return_pct,
            buy_hold_pct: stats.buy_hold_pct,
            max_drawdown_pct: stats.max_drawdown_pct,
            sharpe: stats.sharpe,
            sortino: stats.sortino,
            exposure_time_pct: stats.exposure_time_pct,
            expectancy_pct: stats.expectancy_pct,
            trades: stats.trades,
        }
    }
}
