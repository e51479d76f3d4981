// Pass/fail gate applied after aggregation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{Thresholds, TimeframeConfig};
use crate::types::RunResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    pub all_profitable: bool,
    pub all_positive_sharpe: bool,
    pub weighted_return_good: bool,
    pub pass_test: bool,
}

impl GateDecision {
    /// Names of the criteria that did not pass
    pub fn failed_criteria(&self) -> Vec<&'static str> {
        let mut failed = Vec::new();
        if !self.all_profitable {
            failed.push("all_profitable");
        }
        if !self.all_positive_sharpe {
            failed.push("all_positive_sharpe");
        }
        if !self.weighted_return_good {
            failed.push("weighted_return_good");
        }
        failed
    }
}

fn every_timeframe(
    timeframes: &[TimeframeConfig],
    results: &BTreeMap<String, RunResult>,
    check: impl Fn(&RunResult) -> bool,
) -> bool {
    timeframes
        .iter()
        .all(|tf| results.get(&tf.id).is_some_and(|r| r.success && check(r)))
}

/// Evaluate the three gate criteria. A configured timeframe with no result counts as failed.
pub fn evaluate_gate(
    timeframes: &[TimeframeConfig],
    results: &BTreeMap<String, RunResult>,
    weighted_return: f64,
    thresholds: &Thresholds,
) -> GateDecision {
    let all_profitable = every_timeframe(timeframes, results, |r| {
        r.return_pct > thresholds.min_return_pct
    });
    let all_positive_sharpe =
        every_timeframe(timeframes, results, |r| r.sharpe > thresholds.min_sharpe);
    let weighted_return_good = weighted_return > thresholds.min_weighted_return;

    GateDecision {
        all_profitable,
        all_positive_sharpe,
        weighted_return_good,
        pass_test: all_profitable && all_positive_sharpe && weighted_return_good,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ExtractedMetrics;

    fn ok(tf: &str, return_pct: f64, sharpe: f64) -> RunResult {
        let m = ExtractedMetrics {
            return_pct,
            sharpe,
            found_return: true,
            ..Default::default()
        };
        RunResult::from_metrics(tf, &m, 1.0)
    }

    #[test]
    fn test_missing_timeframe_fails() {
        let timeframes = TimeframeConfig::defaults_for("BTC-USD");
        let results: BTreeMap<String, RunResult> =
            [("15m".to_string(), ok("15m", 5.0, 2.0))].into_iter().collect();
        let decision = evaluate_gate(&timeframes, &results, 5.0, &Thresholds::default());
        assert!(!decision.all_profitable);
        assert!(!decision.all_positive_sharpe);
        assert!(decision.weighted_return_good);
        assert!(!decision.pass_test);
        assert_eq!(decision.failed_criteria(), vec!["all_profitable", "all_positive_sharpe"]);
    }

    #[test]
    fn test_thresholds_are_strict() {
        let timeframes = vec![TimeframeConfig::new("1d", "X-1d.csv", 365, 100, 1.0, "daily")];
        let results: BTreeMap<String, RunResult> =
            [("1d".to_string(), ok("1d", 1.0, 0.5))].into_iter().collect();
        let decision = evaluate_gate(&timeframes, &results, 2.0, &Thresholds::default());
        assert!(!decision.all_profitable);
        assert!(!decision.all_positive_sharpe);
        assert!(!decision.weighted_return_good);
    }
}
