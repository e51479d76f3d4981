use clap::Parser;
use log::{info, warn};
use rbi_validator::data::inspect_dataset;
use rbi_validator::*;
use std::{error::Error as StdError, fs, path::Path};

/// Multi-timeframe validator for RBI strategy scripts
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Strategy script to validate
    #[arg(short, long, required_unless_present = "check")]
    strategy: Option<String>,

    /// Name used for temp files and the report (default: script file stem)
    #[arg(short, long)]
    name: Option<String>,

    /// Base directory containing data/ and results/ (default: $RBI_HOME or .)
    #[arg(short, long)]
    base: Option<String>,

    /// JSON configuration file (timeframes, thresholds, runner settings)
    #[arg(short, long)]
    config: Option<String>,

    /// Per-run timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Maximum number of strategy processes running at once
    #[arg(short, long)]
    parallel: Option<usize>,

    /// Divide weighted scores by the weight of the successful timeframes only
    #[arg(long)]
    renormalize: bool,

    /// Interpreter used to run the strategy script
    #[arg(short, long)]
    interpreter: Option<String>,

    /// Hard-coded dataset path in the script to replace with the real one
    #[arg(long)]
    patch_placeholder: Option<String>,

    /// Symbol pair in the script to replace (requires --patch-placeholder)
    #[arg(long, requires = "patch_placeholder", requires = "patch_symbol_to")]
    patch_symbol_from: Option<String>,

    /// Replacement for --patch-symbol-from
    #[arg(long, requires = "patch_symbol_from")]
    patch_symbol_to: Option<String>,

    /// Only check that the configured datasets are present and print usage hints
    #[arg(long)]
    check: bool,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn build_config(args: &Args) -> Result<ValidationConfig, Box<dyn StdError>> {
    let mut config = match &args.config {
        Some(path) => ValidationConfig::load(path)?,
        None => ValidationConfig::default(),
    };
    if let Some(timeout) = args.timeout {
        config.runner.timeout_secs = timeout;
    }
    if let Some(parallel) = args.parallel {
        config.runner.max_parallel = parallel;
    }
    if args.renormalize {
        config.normalization = WeightNormalization::Renormalized;
    }
    if let Some(ref interpreter) = args.interpreter {
        config.runner.interpreter = interpreter.clone();
    }
    if let Some(ref placeholder) = args.patch_placeholder {
        let patch = config.runner.patch.get_or_insert_with(|| SourcePatch {
            placeholder: placeholder.clone(),
            symbol_from: None,
            symbol_to: None,
        });
        patch.placeholder = placeholder.clone();
        if args.patch_symbol_from.is_some() {
            patch.symbol_from = args.patch_symbol_from.clone();
            patch.symbol_to = args.patch_symbol_to.clone();
        }
    }
    config.validate()?;
    Ok(config)
}

/// Report dataset presence and shape without running anything
fn run_check(validator: &MultiTimeframeValidator) {
    println!("Data directory: {}", validator.paths().data_dir());
    let mut all_present = true;
    for tf in &validator.config().timeframes {
        let path = validator.paths().data_file(&tf.file);
        let info = if Path::new(&path).is_file() {
            match inspect_dataset(&path) {
                Ok(info) => Some(info),
                Err(e) => {
                    warn!("Could not inspect {}: {}", path, e);
                    None
                }
            }
        } else {
            all_present = false;
            None
        };
        println!("{}", display::format_dataset_check(tf, info.as_ref()));
    }
    if !all_present {
        println!("\nSome datasets are missing; validation runs will abort until they are added.");
    }
    println!("\nUsage:");
    for hint in display::usage_hints() {
        println!("  {}", hint);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn StdError>> {
    let args = Args::parse();

    // Setup logging based on verbosity
    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = build_config(&args)?;
    let paths = PathConfig::from_env(args.base.clone());
    let validator = MultiTimeframeValidator::new(config, paths)?;

    if args.check {
        run_check(&validator);
        return Ok(());
    }

    let strategy_path = args
        .strategy
        .as_deref()
        .ok_or("--strategy is required unless --check is given")?;
    let source = fs::read_to_string(strategy_path)
        .map_err(|e| format!("Could not read strategy {}: {}", strategy_path, e))?;
    let name = args.name.clone().unwrap_or_else(|| {
        Path::new(strategy_path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("strategy")
            .to_string()
    });

    info!("Validating '{}' from {}", name, strategy_path);
    let (result, report_path) = validator.validate_and_save(&name, &source).await?;
    display::print_aggregate_summary(&result, &validator.config().timeframes);
    println!("Results saved to: {}", report_path);

    if !result.pass_test {
        std::process::exit(1);
    }
    Ok(())
}
