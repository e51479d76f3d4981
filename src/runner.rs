//! Subprocess execution of strategy scripts.
//!
//! Every run writes the strategy source to its own temporary script, launches the
//! configured interpreter on it with the dataset injected through environment
//! variables, and waits at most `timeout_secs`. Temporary files are removed when
//! the run ends, whatever the outcome.

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::error::Error as StdError;
use std::fs;
use std::io::Write;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use crate::config::{PathConfig, RunnerSettings, ValidationConfig};
use crate::display;
use crate::metrics::{extract_metrics, parse_envelope};
use crate::types::{RunResult, RunStatus};

pub const ENV_DATA_PATH: &str = "RBI_DATA_PATH";
pub const ENV_TIMEFRAME: &str = "RBI_TIMEFRAME";
pub const ENV_SYMBOL: &str = "RBI_SYMBOL";
pub const ENV_RESULT_PATH: &str = "RBI_RESULT_PATH";

/// One strategy run against one dataset
#[derive(Debug, Clone)]
pub struct StrategyJob<'a> {
    pub strategy_name: &'a str,
    pub source: &'a str,
    /// Timeframe id, or dataset name in the dataset-matrix run
    pub label: &'a str,
    pub data_path: &'a str,
    pub symbol: &'a str,
}

/// How the subprocess ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Exited { success: bool, exit_code: Option<i32> },
    TimedOut,
    LaunchFailed(String),
}

/// Raw result of a subprocess run, before metrics are interpreted
#[derive(Debug, Clone)]
pub struct Execution {
    pub outcome: Outcome,
    /// Captured stdout followed by stderr
    pub output: String,
    /// Contents of the result envelope, if the strategy wrote one
    pub envelope: Option<String>,
    pub elapsed_secs: f64,
}

impl Execution {
    /// Failure status for runs that did not exit cleanly
    pub fn failure_status(&self) -> Option<RunStatus> {
        match &self.outcome {
            Outcome::Exited { success: true, .. } => None,
            Outcome::Exited { success: false, exit_code } => Some(RunStatus::StrategyFailure {
                exit_code: *exit_code,
            }),
            Outcome::TimedOut => Some(RunStatus::Timeout),
            Outcome::LaunchFailed(message) => Some(RunStatus::LaunchError {
                message: message.clone(),
            }),
        }
    }
}

/// Keep file name prefixes to characters every filesystem accepts
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Apply the optional legacy source patch
pub fn prepare_source(job: &StrategyJob<'_>, settings: &RunnerSettings) -> String {
    match &settings.patch {
        Some(patch) => patch.apply(job.source, job.data_path),
        None => job.source.to_string(),
    }
}

async fn launch(
    job: &StrategyJob<'_>,
    settings: &RunnerSettings,
) -> Result<(Outcome, String, Option<String>), Box<dyn StdError>> {
    let work_dir = settings.work_dir();
    fs::create_dir_all(&work_dir)?;

    let prefix = format!("rbi_{}_{}_", sanitize(job.strategy_name), sanitize(job.label));
    // Both files are deleted when dropped, including on the timeout and error paths
    let mut script = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(&settings.script_suffix)
        .tempfile_in(&work_dir)?;
    script.write_all(prepare_source(job, settings).as_bytes())?;
    script.flush()?;
    let envelope = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".json")
        .tempfile_in(&work_dir)?;

    debug!(
        "Launching {} {} for '{}' [{}]",
        settings.interpreter,
        script.path().display(),
        job.strategy_name,
        job.label
    );

    let child = Command::new(&settings.interpreter)
        .arg(script.path())
        .env(ENV_DATA_PATH, job.data_path)
        .env(ENV_TIMEFRAME, job.label)
        .env(ENV_SYMBOL, job.symbol)
        .env(ENV_RESULT_PATH, envelope.path())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let limit = Duration::from_secs(settings.timeout_secs);
    let output = match timeout(limit, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => return Ok((Outcome::TimedOut, String::new(), None)),
    };

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.is_empty() {
        text.push('\n');
        text.push_str(&stderr);
    }

    let envelope_text = fs::read_to_string(envelope.path())
        .ok()
        .filter(|s| !s.trim().is_empty());

    let outcome = Outcome::Exited {
        success: output.status.success(),
        exit_code: output.status.code(),
    };
    Ok((outcome, text, envelope_text))
}

/// Run a strategy script once; never fails, problems are reported in the outcome
pub async fn execute(job: &StrategyJob<'_>, settings: &RunnerSettings) -> Execution {
    let started = Instant::now();
    let (outcome, output, envelope) = match launch(job, settings).await {
        Ok(parts) => parts,
        Err(e) => {
            warn!("Could not run '{}' [{}]: {}", job.strategy_name, job.label, e);
            (Outcome::LaunchFailed(e.to_string()), String::new(), None)
        }
    };
    let elapsed_secs = started.elapsed().as_secs_f64();
    if outcome == Outcome::TimedOut {
        warn!(
            "'{}' [{}] timed out after {}s",
            job.strategy_name, job.label, settings.timeout_secs
        );
    }
    Execution {
        outcome,
        output,
        envelope,
        elapsed_secs,
    }
}

/// Interpret an execution as a timeframe result.
///
/// The envelope wins over text scraping; an unreadable envelope falls back to
/// scanning the captured output.
pub fn to_run_result(timeframe: &str, execution: &Execution) -> RunResult {
    if let Some(status) = execution.failure_status() {
        return RunResult::failed(timeframe, status, execution.elapsed_secs);
    }
    let metrics = execution
        .envelope
        .as_deref()
        .and_then(|json| match parse_envelope(json) {
            Ok(m) => Some(m),
            Err(e) => {
                warn!("Ignoring malformed result envelope for [{}]: {}", timeframe, e);
                None
            }
        })
        .unwrap_or_else(|| extract_metrics(&execution.output));
    let result = RunResult::from_metrics(timeframe, &metrics, execution.elapsed_secs);
    if !result.success {
        debug!("Unparsed output for [{}]:\n{}", timeframe, execution.output);
    }
    result
}

/// Run a strategy against one timeframe and return its metrics
pub async fn run_timeframe(job: &StrategyJob<'_>, settings: &RunnerSettings) -> RunResult {
    let execution = execute(job, settings).await;
    to_run_result(job.label, &execution)
}

/// Run a strategy against every configured timeframe.
///
/// At most `max_parallel` processes run at once; results come back in
/// configuration order.
pub async fn run_timeframes(
    config: &ValidationConfig,
    paths: &PathConfig,
    strategy_name: &str,
    source: &str,
) -> Vec<RunResult> {
    let total = config.timeframes.len();
    let parallel = config.runner.max_parallel.max(1);
    info!(
        "Running '{}' on {} timeframes ({} at a time)",
        strategy_name, total, parallel
    );

    stream::iter(config.timeframes.iter().enumerate())
        .map(|(i, tf)| async move {
            let data_path = paths.data_file(&tf.file);
            let job = StrategyJob {
                strategy_name,
                source,
                label: &tf.id,
                data_path: &data_path,
                symbol: &config.symbol,
            };
            let result = run_timeframe(&job, &config.runner).await;
            println!("{}", display::format_run_progress(strategy_name, &tf.id, i + 1, total));
            println!("{}", display::format_run_result(&result));
            result
        })
        .buffered(parallel)
        .collect()
        .await
}
