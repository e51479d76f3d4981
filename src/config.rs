// Configuration module for the validation harness
// Contains timeframe definitions, gate thresholds, runner settings and path helpers

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::{env, error::Error as StdError, fs, path::PathBuf};

pub const DEFAULT_SYMBOL: &str = "BTC-USD";

/// Allowed deviation of the summed timeframe weights from 1.0
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// One timeframe the strategy is validated against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeConfig {
    pub id: String,
    pub file: String,
    pub lookback_days: u32,
    pub min_candles: usize,
    pub weight: f64,
    pub label: String,
}

impl TimeframeConfig {
    /// Default timeframe table: (id, lookback days, min candles, weight, label)
    const DEFINITIONS: &'static [(&'static str, u32, usize, f64, &'static str)] = &[
        ("15m", 30, 2000, 0.40, "Short-term intraday"),
        ("1h", 90, 1500, 0.30, "Medium-term swing"),
        ("4h", 180, 800, 0.20, "Position trading"),
        ("1d", 730, 300, 0.10, "Long-term trend"),
    ];

    pub fn new(id: &str, file: &str, lookback_days: u32, min_candles: usize, weight: f64, label: &str) -> Self {
        Self {
            id: id.to_string(),
            file: file.to_string(),
            lookback_days,
            min_candles,
            weight,
            label: label.to_string(),
        }
    }

    /// Default timeframes for a symbol pair such as "BTC-USD"
    pub fn defaults_for(symbol: &str) -> Vec<Self> {
        Self::DEFINITIONS
            .iter()
            .map(|(id, days, candles, weight, label)| {
                Self::new(id, &dataset_file_name(symbol, id), *days, *candles, *weight, label)
            })
            .collect()
    }
}

/// Conventional dataset file name: `<SYMBOL>-<QUOTE>-<timeframe>.csv`
pub fn dataset_file_name(symbol: &str, timeframe: &str) -> String {
    format!("{}-{}.csv", symbol, timeframe)
}

/// Symbol pair encoded in a conventional dataset file name ("BTC-USD-1h.csv" -> "BTC-USD")
pub fn symbol_from_file_name(file: &str) -> String {
    let stem = file.strip_suffix(".csv").unwrap_or(file);
    match stem.rsplit_once('-') {
        Some((symbol, _)) if !symbol.is_empty() => symbol.to_string(),
        _ => stem.to_string(),
    }
}

/// How weights of failed timeframes are treated when aggregating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightNormalization {
    /// Failed timeframes contribute zero and their weight is not redistributed
    #[default]
    Fixed,
    /// Divide by the summed weight of the successful timeframes only
    Renormalized,
}

/// Gate thresholds; every comparison is strict
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub min_return_pct: f64,
    pub min_sharpe: f64,
    pub min_weighted_return: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_return_pct: 1.0,
            min_sharpe: 0.5,
            min_weighted_return: 2.0,
        }
    }
}

/// Legacy templating shim: substring replacement applied to the strategy source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePatch {
    /// Hard-coded dataset path in the script, replaced by the real dataset path
    pub placeholder: String,
    #[serde(default)]
    pub symbol_from: Option<String>,
    #[serde(default)]
    pub symbol_to: Option<String>,
}

impl SourcePatch {
    pub fn apply(&self, source: &str, data_path: &str) -> String {
        let mut patched = source.replace(&self.placeholder, data_path);
        if let (Some(from), Some(to)) = (&self.symbol_from, &self.symbol_to) {
            patched = patched.replace(from.as_str(), to);
        }
        patched
    }
}

/// How strategy subprocesses are launched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    pub interpreter: String,
    /// Extension given to the temporary script file
    pub script_suffix: String,
    pub timeout_secs: u64,
    /// Directory for temporary scripts; the system temp dir when unset
    pub work_dir: Option<PathBuf>,
    /// Upper bound on concurrently running strategy processes
    pub max_parallel: usize,
    pub patch: Option<SourcePatch>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            script_suffix: ".py".to_string(),
            timeout_secs: 120,
            work_dir: None,
            max_parallel: 1,
            patch: None,
        }
    }
}

impl RunnerSettings {
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(env::temp_dir)
    }
}

/// Immutable harness configuration, validated once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConfigFile")]
pub struct ValidationConfig {
    pub symbol: String,
    pub timeframes: Vec<TimeframeConfig>,
    pub thresholds: Thresholds,
    pub normalization: WeightNormalization,
    pub runner: RunnerSettings,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let symbol = DEFAULT_SYMBOL.to_string();
        Self {
            timeframes: TimeframeConfig::defaults_for(&symbol),
            symbol,
            thresholds: Thresholds::default(),
            normalization: WeightNormalization::default(),
            runner: RunnerSettings::default(),
        }
    }
}

/// On-disk form: symbol and timeframes may each be omitted
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    symbol: Option<String>,
    timeframes: Option<Vec<TimeframeConfig>>,
    thresholds: Thresholds,
    normalization: WeightNormalization,
    runner: RunnerSettings,
}

impl From<ConfigFile> for ValidationConfig {
    /// A missing symbol is read from the first dataset file name; missing
    /// timeframes are the defaults for the symbol
    fn from(file: ConfigFile) -> Self {
        let symbol = file
            .symbol
            .or_else(|| {
                file.timeframes
                    .as_ref()
                    .and_then(|tfs| tfs.first())
                    .map(|tf| symbol_from_file_name(&tf.file))
            })
            .unwrap_or_else(|| DEFAULT_SYMBOL.to_string());
        let timeframes = file
            .timeframes
            .unwrap_or_else(|| TimeframeConfig::defaults_for(&symbol));
        Self {
            symbol,
            timeframes,
            thresholds: file.thresholds,
            normalization: file.normalization,
            runner: file.runner,
        }
    }
}

impl ValidationConfig {
    /// Load a JSON configuration file; missing sections fall back to defaults
    pub fn load(path: &str) -> Result<Self, Box<dyn StdError>> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("Could not read config file {}: {}", path, e))?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        info!("Loaded configuration from {} ({} timeframes)", path, config.timeframes.len());
        Ok(config)
    }

    /// Check the invariants the aggregator and gate rely on
    pub fn validate(&self) -> Result<(), Box<dyn StdError>> {
        if self.timeframes.is_empty() {
            return Err("At least one timeframe must be configured".into());
        }
        for (i, tf) in self.timeframes.iter().enumerate() {
            if tf.weight < 0.0 || !tf.weight.is_finite() {
                return Err(format!("Timeframe '{}' has invalid weight {}", tf.id, tf.weight).into());
            }
            if self.timeframes[..i].iter().any(|other| other.id == tf.id) {
                return Err(format!("Duplicate timeframe id '{}'", tf.id).into());
            }
            let file_symbol = symbol_from_file_name(&tf.file);
            if file_symbol != self.symbol {
                return Err(format!(
                    "Timeframe '{}' uses {} ({}) but the configured symbol is {}",
                    tf.id, tf.file, file_symbol, self.symbol
                )
                .into());
            }
        }
        let total: f64 = self.timeframes.iter().map(|tf| tf.weight).sum();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(format!("Timeframe weights must sum to 1.0, got {:.6}", total).into());
        }
        if self.runner.timeout_secs == 0 {
            return Err("Runner timeout must be at least one second".into());
        }
        if self.runner.max_parallel == 0 {
            return Err("max_parallel must be at least 1".into());
        }
        debug!("Configuration valid: weights sum to {:.6}", total);
        Ok(())
    }
}

/// Path configuration for consistent file/directory access
#[derive(Debug, Clone)]
pub struct PathConfig {
    pub base: String,
}

impl PathConfig {
    pub fn new(base: String) -> Self {
        Self { base }
    }

    /// Use the given base, else `RBI_HOME`, else the current directory
    pub fn from_env(base_arg: Option<String>) -> Self {
        let base = base_arg
            .or_else(|| env::var("RBI_HOME").ok())
            .unwrap_or_else(|| String::from("."));
        Self::new(base)
    }

    pub fn data_dir(&self) -> String {
        format!("{}/data", self.base)
    }

    pub fn data_file(&self, file: &str) -> String {
        format!("{}/data/{}", self.base, file)
    }

    pub fn results_dir(&self) -> String {
        format!("{}/results", self.base)
    }

    /// JSON report of a multi-timeframe validation
    pub fn aggregate_file(&self, strategy: &str) -> String {
        format!("{}/{}_multi_tf.json", self.results_dir(), strategy)
    }

    /// CSV report of a dataset-matrix run
    pub fn matrix_file(&self, strategy: &str) -> String {
        format!("{}/{}_multi_data.csv", self.results_dir(), strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ValidationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeframes.len(), 4);
        assert_eq!(config.timeframes[0].file, "BTC-USD-15m.csv");
        assert_eq!(config.timeframes[3].id, "1d");
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let mut config = ValidationConfig::default();
        config.timeframes[0].weight = 0.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn test_duplicate_and_empty_timeframes_rejected() {
        let mut config = ValidationConfig::default();
        config.timeframes[1].id = "15m".to_string();
        assert!(config.validate().is_err());

        config.timeframes.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "symbol": "ETH-USD", "thresholds": { "min_sharpe": 0.8 } }"#;
        let config: ValidationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.symbol, "ETH-USD");
        assert_eq!(config.thresholds.min_sharpe, 0.8);
        assert_eq!(config.thresholds.min_return_pct, 1.0);
        assert_eq!(config.runner.timeout_secs, 120);
        assert_eq!(config.normalization, WeightNormalization::Fixed);
        assert!(config.timeframes.iter().all(|tf| tf.file.starts_with("ETH-USD-")));
        assert_eq!(config.timeframes[0].file, "ETH-USD-15m.csv");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_symbol_mismatch_rejected() {
        let json = r#"{
            "symbol": "ETH-USD",
            "timeframes": [
                { "id": "1d", "file": "BTC-USD-1d.csv", "lookback_days": 365, "min_candles": 200, "weight": 1.0, "label": "trend" }
            ]
        }"#;
        let config: ValidationConfig = serde_json::from_str(json).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("configured symbol is ETH-USD"));
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harness.json");
        let json = r#"{
            "normalization": "renormalized",
            "timeframes": [
                { "id": "1h", "file": "SOL-USD-1h.csv", "lookback_days": 60, "min_candles": 100, "weight": 0.5, "label": "swing" },
                { "id": "1d", "file": "SOL-USD-1d.csv", "lookback_days": 365, "min_candles": 200, "weight": 0.5, "label": "trend" }
            ],
            "runner": { "interpreter": "sh", "timeout_secs": 5 }
        }"#;
        fs::write(&path, json).unwrap();

        let config = ValidationConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.normalization, WeightNormalization::Renormalized);
        assert_eq!(config.timeframes.len(), 2);
        assert_eq!(config.symbol, "SOL-USD");
        assert_eq!(config.runner.interpreter, "sh");
        assert_eq!(config.runner.max_parallel, 1);
    }

    #[test]
    fn test_source_patch() {
        let patch = SourcePatch {
            placeholder: "/data/BTC-USD-15m.csv".to_string(),
            symbol_from: Some("BTC-USD".to_string()),
            symbol_to: Some("ETH-USD".to_string()),
        };
        let source = "load('/data/BTC-USD-15m.csv')\nprint('BTC-USD')";
        let patched = patch.apply(source, "/srv/data/ETH-USD-1h.csv");
        assert_eq!(patched, "load('/srv/data/ETH-USD-1h.csv')\nprint('ETH-USD')");
    }

    #[test]
    fn test_symbol_from_file_name() {
        assert_eq!(symbol_from_file_name("BTC-USD-15m.csv"), "BTC-USD");
        assert_eq!(symbol_from_file_name("prices.csv"), "prices");
    }

    #[test]
    fn test_path_config() {
        let paths = PathConfig::new("/srv/rbi".to_string());
        assert_eq!(paths.data_file("BTC-USD-1h.csv"), "/srv/rbi/data/BTC-USD-1h.csv");
        assert_eq!(paths.aggregate_file("momo"), "/srv/rbi/results/momo_multi_tf.json");
        assert_eq!(paths.matrix_file("momo"), "/srv/rbi/results/momo_multi_data.csv");
    }
}
