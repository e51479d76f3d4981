//! Multi-timeframe validation harness for externally authored backtest strategies.
//!
//! A candidate strategy script is executed once per configured timeframe (or per
//! dataset), its performance metrics are extracted from the run, and a weighted
//! pass/fail gate decides whether the strategy generalizes across horizons.

pub mod aggregate;
pub mod config;
pub mod data;
pub mod display;
pub mod gate;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod types;
pub mod validator;

pub use aggregate::{weighted_scores, WeightedScores};
pub use config::{
    PathConfig, RunnerSettings, SourcePatch, Thresholds, TimeframeConfig, ValidationConfig,
    WeightNormalization,
};
pub use gate::{evaluate_gate, GateDecision};
pub use metrics::{extract_metrics, extract_stats_table, parse_envelope, ExtractedMetrics};
pub use types::{AggregateResult, DatasetRow, RunResult, RunStatus, StrategyStats};
pub use validator::{DatasetMatrix, MultiTimeframeValidator};
