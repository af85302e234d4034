//! pm-agent command-line entry point.

use anyhow::Result;
use clap::Parser;
use pm_agent::cli::{Cli, Runner};
use pm_agent::config::ConfigLoader;
use pm_agent::db::Database;
use pm_agent::error::CommandError;
use serde_json::json;
use std::fs::OpenOptions;
use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;

/// Install the global subscriber. `--log` picks the sink: `0`/`off`,
/// `1`/`stdout`, `2`/`stderr`, or a file appended to. Colours only on a
/// terminal.
fn init_logging(log: &str, verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let builder = FmtSubscriber::builder().with_max_level(level);
    match log {
        "0" | "off" => {}
        "1" | "stdout" => {
            let ansi = io::stdout().is_terminal();
            tracing::subscriber::set_global_default(
                builder.with_writer(io::stdout).with_ansi(ansi).finish(),
            )?
        }
        "2" | "stderr" => {
            let ansi = io::stderr().is_terminal();
            tracing::subscriber::set_global_default(
                builder.with_writer(io::stderr).with_ansi(ansi).finish(),
            )?
        }
        path => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let subscriber = builder.with_writer(Mutex::new(file)).with_ansi(false).finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

fn run(cli: Cli) -> Result<String> {
    let mut loader = ConfigLoader::load(cli.config.as_deref())?;
    for source in loader.sources() {
        debug!(path = %source.display(), "Using config file");
    }

    // CLI flags override every config tier
    let config = loader.config_mut();
    if let Some(db_path) = cli.database {
        config.store.db_path = db_path;
    }
    if let Some(format) = cli.format {
        config.output.format = format.into();
    }

    let config = loader.into_config();
    config.ensure_db_dir()?;

    let db = Database::open(&config.store.db_path)?;
    let runner = Runner::new(&db, config.store.delete_policy, config.output.format);
    runner.run(cli.command)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log, cli.verbose) {
        eprintln!("Failed to initialize logging: {:#}", e);
    }

    match run(cli) {
        Ok(output) => {
            println!("{}", output.trim_end());
            ExitCode::SUCCESS
        }
        Err(e) => {
            let err = CommandError::from(e);
            let body = json!({ "error": err });
            match serde_json::to_string_pretty(&body) {
                Ok(text) => eprintln!("{}", text),
                Err(_) => eprintln!("{}", err),
            }
            ExitCode::FAILURE
        }
    }
}
