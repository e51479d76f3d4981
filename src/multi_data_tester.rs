use clap::Parser;
use log::info;
use rbi_validator::*;
use std::{error::Error as StdError, fs, path::Path};

/// Run one strategy script against many datasets and tabulate the statistics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Strategy script to run
    #[arg(short, long)]
    strategy: String,

    /// Name used for temp files and the CSV (default: script file stem)
    #[arg(short, long)]
    name: Option<String>,

    /// Comma-separated dataset files (default: every .csv in the data directory)
    #[arg(short, long, value_delimiter = ',')]
    datasets: Option<Vec<String>>,

    /// Base directory containing data/ and results/ (default: $RBI_HOME or .)
    #[arg(short, long)]
    base: Option<String>,

    /// Per-run timeout in seconds
    #[arg(short, long, default_value = "120")]
    timeout: u64,

    /// Maximum number of strategy processes running at once
    #[arg(short, long, default_value = "1")]
    parallel: usize,

    /// Interpreter used to run the strategy script
    #[arg(short, long, default_value = "python3")]
    interpreter: String,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn StdError>> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let source = fs::read_to_string(&args.strategy)
        .map_err(|e| format!("Could not read strategy {}: {}", args.strategy, e))?;
    let name = args.name.clone().unwrap_or_else(|| {
        Path::new(&args.strategy)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("strategy")
            .to_string()
    });

    let runner = RunnerSettings {
        interpreter: args.interpreter.clone(),
        timeout_secs: args.timeout,
        max_parallel: args.parallel,
        ..RunnerSettings::default()
    };
    let paths = PathConfig::from_env(args.base.clone());
    let matrix = DatasetMatrix::new(runner, paths.clone())?;

    let datasets = match args.datasets {
        Some(ref list) => list.clone(),
        None => matrix.discover()?,
    };
    if datasets.is_empty() {
        return Err(format!("No datasets found in {}", paths.data_dir()).into());
    }

    info!("Testing '{}' on {} datasets", name, datasets.len());
    let results = matrix.run(&name, &source, &datasets).await?;
    display::print_dataset_matrix(&name, &results);

    let rows: Vec<DatasetRow> = results.into_iter().map(|(row, _)| row).collect();
    let path = report::save_dataset_matrix(&paths, &name, &rows)?;
    println!("Results saved to: {}", path);
    Ok(())
}
