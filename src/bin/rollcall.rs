//! CLI binary for rollcall.

use chrono::Utc;
use clap::{Parser, Subcommand};
use rollcall::config::ConfigSeverity;
use rollcall::scheduler::WeeklySchedule;
use rollcall::{RollcallConfig, Service};
use std::path::{Path, PathBuf};
use tracing::info;

/// Chat attendance roster with a weekly export to an administrator.
#[derive(Parser)]
#[command(name = "rollcall", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Run the webhook gateway and the weekly scheduler.
    Serve,

    /// Validate configuration and exit non-zero on errors.
    CheckConfig,

    /// Print upcoming weekly cycle times.
    NextRun {
        /// How many upcoming runs to print.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let _log_guard = rollcall::logging::init(&config.logging);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::CheckConfig => check_config(&config),
        Command::NextRun { count } => next_run(&config, count),
    }
}

/// Explicit paths must exist; the default path is optional.
fn load_config(path: Option<&Path>) -> anyhow::Result<RollcallConfig> {
    let mut config = match path {
        Some(path) => RollcallConfig::from_file(path)?,
        None => {
            let default_path = RollcallConfig::default_config_path();
            if default_path.exists() {
                RollcallConfig::from_file(&default_path)?
            } else {
                RollcallConfig::default()
            }
        }
    };
    config.apply_env_overrides();
    Ok(config)
}

async fn serve(config: RollcallConfig) -> anyhow::Result<()> {
    info!("rollcall v{}", env!("CARGO_PKG_VERSION"));
    let service = Service::from_config(config)?;
    service.run().await
}

fn check_config(config: &RollcallConfig) -> anyhow::Result<()> {
    let issues = config.validate();
    if issues.is_empty() {
        println!("configuration OK");
        return Ok(());
    }

    for issue in &issues {
        let level = match issue.severity {
            ConfigSeverity::Warning => "warning",
            ConfigSeverity::Error => "error",
        };
        println!("{level}: [{}] {}: {}", issue.id, issue.title, issue.summary);
    }

    if RollcallConfig::has_blocking_issues(&issues) {
        anyhow::bail!("configuration has errors");
    }
    Ok(())
}

fn next_run(config: &RollcallConfig, count: usize) -> anyhow::Result<()> {
    let schedule = WeeklySchedule::from_config(&config.schedule)?;
    println!("{schedule}");

    let mut after = Utc::now();
    for _ in 0..count.max(1) {
        let next = schedule.next_after(after);
        println!("{}", next.with_timezone(&schedule.timezone).to_rfc3339());
        after = next;
    }
    Ok(())
}
