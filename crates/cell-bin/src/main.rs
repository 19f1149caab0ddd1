//! `cellrun` entrypoint: replay an editing script against one cell and print
//! the projected segments and final persisted state as JSON.
use anyhow::{Context, Result};
use cell_bin::{parse_script, replay};
use clap::Parser;
use core_config::load_from;
use core_state::SessionOptions;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

const LOG_FILE: &str = "cellrun.log";

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "cellrun", version, about = "Replay a cell editing script")]
struct Args {
    /// JSON script: `{"cell": {...}, "ops": [...]}`.
    pub script: PathBuf,
    /// Optional configuration file path (overrides discovery of `cellrun.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Directory receiving `cellrun.log`. Filter with `RUST_LOG`.
    #[arg(long = "log-dir", default_value = ".")]
    pub log_dir: PathBuf,
}

fn configure_logging(log_dir: &Path) -> Result<Option<WorkerGuard>> {
    let log_path = log_dir.join(LOG_FILE);
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(false)
        .with_writer(nb_writer)
        .try_init()
    {
        Ok(_) => Ok(Some(guard)),
        // Global subscriber already installed; dropping the guard shuts the writer down.
        Err(_err) => Ok(None),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging(&args.log_dir)?;

    let config = load_from(args.config.clone())?;
    let raw = std::fs::read_to_string(&args.script)
        .with_context(|| format!("reading script {}", args.script.display()))?;
    let script = parse_script(&raw)?;
    info!(
        target: "runtime.startup",
        script = %args.script.display(),
        ops = script.ops.len(),
        config_override = args.config.is_some(),
        history_depth = config.history_depth(),
        "replay_start"
    );

    let report = replay(script, SessionOptions::from(&config))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
