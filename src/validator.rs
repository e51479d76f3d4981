//! Orchestration of validation runs.
//!
//! `MultiTimeframeValidator` runs one strategy against every configured
//! timeframe, aggregates and gates the results. `DatasetMatrix` runs one strategy
//! against a list of datasets and produces the flat statistics table.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use log::{info, warn};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::path::Path;

use crate::aggregate::weighted_scores;
use crate::config::{symbol_from_file_name, PathConfig, RunnerSettings, ValidationConfig};
use crate::data::{discover_datasets, missing_datasets};
use crate::display;
use crate::gate::evaluate_gate;
use crate::metrics::{extract_metrics, extract_stats_table, parse_envelope_stats};
use crate::report;
use crate::runner::{self, Execution, StrategyJob};
use crate::types::{AggregateResult, DatasetRow, RunResult, RunStatus, StrategyStats};

/// Aggregate and gate a set of timeframe results. Pure: same inputs, same output.
pub fn build_aggregate(
    config: &ValidationConfig,
    strategy_name: &str,
    tested_at: &str,
    results: Vec<RunResult>,
) -> AggregateResult {
    let timeframe_results: BTreeMap<String, RunResult> = results
        .into_iter()
        .map(|r| (r.timeframe.clone(), r))
        .collect();

    let scores = weighted_scores(&config.timeframes, &timeframe_results, config.normalization);
    let decision = evaluate_gate(
        &config.timeframes,
        &timeframe_results,
        scores.weighted_return,
        &config.thresholds,
    );

    AggregateResult {
        strategy_name: strategy_name.to_string(),
        tested_at: tested_at.to_string(),
        normalization: config.normalization,
        timeframe_results,
        weighted_return: scores.weighted_return,
        weighted_sharpe: scores.weighted_sharpe,
        all_profitable: decision.all_profitable,
        all_positive_sharpe: decision.all_positive_sharpe,
        weighted_return_good: decision.weighted_return_good,
        pass_test: decision.pass_test,
    }
}

pub struct MultiTimeframeValidator {
    config: ValidationConfig,
    paths: PathConfig,
}

impl MultiTimeframeValidator {
    pub fn new(config: ValidationConfig, paths: PathConfig) -> Result<Self, Box<dyn StdError>> {
        config.validate()?;
        Ok(Self { config, paths })
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn paths(&self) -> &PathConfig {
        &self.paths
    }

    /// Dataset path of every configured timeframe, in configuration order
    pub fn dataset_paths(&self) -> Vec<String> {
        self.config
            .timeframes
            .iter()
            .map(|tf| self.paths.data_file(&tf.file))
            .collect()
    }

    /// Fail if any configured dataset is missing; no partial runs are attempted
    pub fn check_datasets(&self) -> Result<(), Box<dyn StdError>> {
        let missing = missing_datasets(&self.dataset_paths());
        if missing.is_empty() {
            Ok(())
        } else {
            Err(display::format_missing_datasets(&missing).into())
        }
    }

    pub fn assess(&self, strategy_name: &str, results: Vec<RunResult>) -> AggregateResult {
        let tested_at = Utc::now().to_rfc3339();
        build_aggregate(&self.config, strategy_name, &tested_at, results)
    }

    pub async fn validate(&self, strategy_name: &str, source: &str) -> Result<AggregateResult, Box<dyn StdError>> {
        self.check_datasets()?;
        let results = runner::run_timeframes(&self.config, &self.paths, strategy_name, source).await;
        let result = self.assess(strategy_name, results);
        if result.pass_test {
            info!("'{}' passed validation (weighted return {:.2}%)", strategy_name, result.weighted_return);
        } else {
            warn!("'{}' failed validation (weighted return {:.2}%)", strategy_name, result.weighted_return);
        }
        Ok(result)
    }

    /// Validate and write the JSON report; returns the result and the report path
    pub async fn validate_and_save(
        &self,
        strategy_name: &str,
        source: &str,
    ) -> Result<(AggregateResult, String), Box<dyn StdError>> {
        let result = self.validate(strategy_name, source).await?;
        let path = report::save_aggregate(&self.paths, &result)?;
        Ok((result, path))
    }
}

/// Statistics for one dataset run; failed runs yield a zero row
pub fn to_dataset_row(data_source: &str, execution: &Execution) -> (DatasetRow, RunStatus) {
    if let Some(status) = execution.failure_status() {
        return (DatasetRow::new(data_source, &StrategyStats::default()), status);
    }

    let from_envelope = execution.envelope.as_deref().and_then(|json| {
        parse_envelope_stats(json)
            .map_err(|e| warn!("Ignoring malformed result envelope for {}: {}", data_source, e))
            .ok()
    });
    let stats = from_envelope
        .or_else(|| extract_stats_table(&execution.output))
        .or_else(|| {
            let metrics = extract_metrics(&execution.output);
            metrics.found_return.then(|| StrategyStats::from(&metrics))
        });

    match stats {
        Some(stats) => (DatasetRow::new(data_source, &stats), RunStatus::Success),
        None => (
            DatasetRow::new(data_source, &StrategyStats::default()),
            RunStatus::ParseError,
        ),
    }
}

pub struct DatasetMatrix {
    runner: RunnerSettings,
    paths: PathConfig,
}

impl DatasetMatrix {
    pub fn new(runner: RunnerSettings, paths: PathConfig) -> Result<Self, Box<dyn StdError>> {
        if runner.timeout_secs == 0 {
            return Err("Runner timeout must be at least one second".into());
        }
        if runner.max_parallel == 0 {
            return Err("max_parallel must be at least 1".into());
        }
        Ok(Self { runner, paths })
    }

    /// Every `.csv` file in the data directory
    pub fn discover(&self) -> Result<Vec<String>, Box<dyn StdError>> {
        discover_datasets(&self.paths.data_dir())
    }

    /// Bare names resolve inside the data directory; anything with a separator is used as is
    pub fn resolve(&self, dataset: &str) -> String {
        if dataset.contains('/') || dataset.contains('\\') {
            dataset.to_string()
        } else {
            self.paths.data_file(dataset)
        }
    }

    pub async fn run(
        &self,
        strategy_name: &str,
        source: &str,
        datasets: &[String],
    ) -> Result<Vec<(DatasetRow, RunStatus)>, Box<dyn StdError>> {
        let resolved: Vec<String> = datasets.iter().map(|d| self.resolve(d)).collect();
        let missing = missing_datasets(&resolved);
        if !missing.is_empty() {
            return Err(display::format_missing_datasets(&missing).into());
        }

        let total = resolved.len();
        info!("Running '{}' on {} datasets", strategy_name, total);

        let rows = stream::iter(resolved.iter().enumerate())
            .map(|(i, data_path)| async move {
                let file_name = Path::new(data_path)
                    .file_name()
                    .and_then(|s| s.to_str())
                    .unwrap_or(data_path.as_str())
                    .to_string();
                let label = file_name.strip_suffix(".csv").unwrap_or(&file_name).to_string();
                let symbol = symbol_from_file_name(&file_name);
                let job = StrategyJob {
                    strategy_name,
                    source,
                    label: &label,
                    data_path,
                    symbol: &symbol,
                };
                let execution = runner::execute(&job, &self.runner).await;
                println!("{}", display::format_run_progress(strategy_name, &label, i + 1, total));
                to_dataset_row(&file_name, &execution)
            })
            .buffered(self.runner.max_parallel)
            .collect::<Vec<_>>()
            .await;

        Ok(rows)
    }
}
