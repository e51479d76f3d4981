// Dataset file checks: existence, discovery and a light shape inspection

use log::debug;
use std::{error::Error as StdError, fs, path::Path};

/// Accepted names for the timestamp column
const DATETIME_COLUMNS: &[&str] = &["datetime", "date", "timestamp", "time"];
const PRICE_COLUMNS: &[&str] = &["open", "high", "low", "close", "volume"];

/// Shape of a dataset file as seen by the smoke test
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetInfo {
    pub path: String,
    pub rows: usize,
    pub missing_columns: Vec<String>,
}

impl DatasetInfo {
    pub fn has_ohlcv(&self) -> bool {
        self.missing_columns.is_empty()
    }
}

/// Paths from the list that do not exist on disk
pub fn missing_datasets(paths: &[String]) -> Vec<String> {
    paths
        .iter()
        .filter(|p| !Path::new(p.as_str()).is_file())
        .cloned()
        .collect()
}

/// Sorted `.csv` file names in a data directory
pub fn discover_datasets(data_dir: &str) -> Result<Vec<String>, Box<dyn StdError>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(data_dir)
        .map_err(|e| format!("Could not read data directory {}: {}", data_dir, e))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("csv") {
            if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                files.push(name.to_string());
            }
        }
    }
    files.sort();
    debug!("Found {} datasets in {}", files.len(), data_dir);
    Ok(files)
}

/// Count candles and check for OHLCV columns (case-insensitive)
pub fn inspect_dataset(path: &str) -> Result<DatasetInfo, Box<dyn StdError>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let mut missing_columns = Vec::new();
    if !DATETIME_COLUMNS.iter().any(|c| headers.iter().any(|h| h == c)) {
        missing_columns.push("datetime".to_string());
    }
    for column in PRICE_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            missing_columns.push(column.to_string());
        }
    }

    let mut rows = 0;
    for record in reader.records() {
        record?;
        rows += 1;
    }

    Ok(DatasetInfo {
        path: path.to_string(),
        rows,
        missing_columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inspect_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BTC-USD-1h.csv");
        fs::write(
            &path,
            "Datetime,Open,High,Low,Close,Volume\n\
             2024-01-01 00:00,1,2,0.5,1.5,100\n\
             2024-01-01 01:00,1.5,2,1,1.8,120\n",
        )
        .unwrap();
        let info = inspect_dataset(path.to_str().unwrap()).unwrap();
        assert_eq!(info.rows, 2);
        assert!(info.has_ohlcv());
    }

    #[test]
    fn test_inspect_reports_missing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "time,close\n1,2\n").unwrap();
        let info = inspect_dataset(path.to_str().unwrap()).unwrap();
        assert_eq!(info.missing_columns, vec!["open", "high", "low", "volume"]);
    }

    #[test]
    fn test_discover_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.csv"), "x\n").unwrap();
        fs::write(dir.path().join("a.csv"), "x\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "x\n").unwrap();
        let files = discover_datasets(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(files, vec!["a.csv", "b.csv"]);

        let present = dir.path().join("a.csv").to_str().unwrap().to_string();
        let absent = dir.path().join("zzz.csv").to_str().unwrap().to_string();
        assert_eq!(missing_datasets(&[present, absent.clone()]), vec![absent]);
    }
}
