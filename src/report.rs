// Persistence of validation results: JSON per strategy, CSV for the dataset matrix

use log::info;
use polars::df;
use polars::prelude::{CsvWriter, SerWriter};
use std::{error::Error as StdError, fs, fs::File, path::Path};

use crate::config::PathConfig;
use crate::types::{AggregateResult, DatasetRow};

fn ensure_parent_dir(path: &str) -> Result<(), Box<dyn StdError>> {
    if let Some(parent) = Path::new(path).parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Write `<results>/<strategy>_multi_tf.json` and return its path
pub fn save_aggregate(paths: &PathConfig, result: &AggregateResult) -> Result<String, Box<dyn StdError>> {
    let path = paths.aggregate_file(&result.strategy_name);
    ensure_parent_dir(&path)?;
    let json = serde_json::to_string_pretty(result)?;
    fs::write(&path, json)?;
    info!("Saved validation results for '{}' to {}", result.strategy_name, path);
    Ok(path)
}

pub fn load_aggregate(path: &str) -> Result<AggregateResult, Box<dyn StdError>> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Write `<results>/<strategy>_multi_data.csv` (one row per dataset) and return its path
pub fn save_dataset_matrix(
    paths: &PathConfig,
    strategy: &str,
    rows: &[DatasetRow],
) -> Result<String, Box<dyn StdError>> {
    let path = paths.matrix_file(strategy);
    ensure_parent_dir(&path)?;

    let mut df = df! {
        "Data_Source" => rows.iter().map(|r| r.data_source.as_str()).collect::<Vec<_>>(),
        "Return_%" => rows.iter().map(|r| r.return_pct).collect::<Vec<_>>(),
        "Buy_Hold_%" => rows.iter().map(|r| r.buy_hold_pct).collect::<Vec<_>>(),
        "Max_DD_%" => rows.iter().map(|r| r.max_drawdown_pct).collect::<Vec<_>>(),
        "Sharpe" => rows.iter().map(|r| r.sharpe).collect::<Vec<_>>(),
        "Sortino" => rows.iter().map(|r| r.sortino).collect::<Vec<_>>(),
        "Exposure_Time_%" => rows.iter().map(|r| r.exposure_time_pct).collect::<Vec<_>>(),
        "Expectancy_%" => rows.iter().map(|r| r.expectancy_pct).collect::<Vec<_>>(),
        "Trades" => rows.iter().map(|r| r.trades as i64).collect::<Vec<_>>(),
    }?;

    let mut file = File::create(&path)?;
    CsvWriter::new(&mut file).finish(&mut df)?;
    info!("Wrote {} dataset rows for '{}' to {}", rows.len(), strategy, path);
    Ok(path)
}

pub fn load_dataset_matrix(path: &str) -> Result<Vec<DatasetRow>, Box<dyn StdError>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: DatasetRow = record?;
        rows.push(row);
    }
    Ok(rows)
}
