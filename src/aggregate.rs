// Weighted aggregation of per-timeframe results

use std::collections::BTreeMap;

use crate::config::{TimeframeConfig, WeightNormalization};
use crate::types::RunResult;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedScores {
    pub weighted_return: f64,
    pub weighted_sharpe: f64,
}

/// Combine results using the configured timeframe weights.
///
/// Only successful runs contribute. With `Fixed` normalization the weight of a
/// failed or missing timeframe is simply lost, so the scores under-count; with
/// `Renormalized` the sums are divided by the weight of the successful
/// timeframes (zero when nothing succeeded).
pub fn weighted_scores(
    timeframes: &[TimeframeConfig],
    results: &BTreeMap<String, RunResult>,
    normalization: WeightNormalization,
) -> WeightedScores {
    let mut weighted_return = 0.0;
    let mut weighted_sharpe = 0.0;
    let mut successful_weight = 0.0;

    for tf in timeframes {
        if let Some(result) = results.get(&tf.id).filter(|r| r.success) {
            weighted_return += result.return_pct * tf.weight;
            weighted_sharpe += result.sharpe * tf.weight;
            successful_weight += tf.weight;
        }
    }

    match normalization {
        WeightNormalization::Fixed => WeightedScores {
            weighted_return,
            weighted_sharpe,
        },
        WeightNormalization::Renormalized if successful_weight > 0.0 => WeightedScores {
            weighted_return: weighted_return / successful_weight,
            weighted_sharpe: weighted_sharpe / successful_weight,
        },
        WeightNormalization::Renormalized => WeightedScores {
            weighted_return: 0.0,
            weighted_sharpe: 0.0,
        },
    }
}
