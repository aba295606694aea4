//! Capped event log demo
//!
//! Runs the overflow, replication and prune scenarios against in-process
//! capped event logs and prints a report for each.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use capped_core::PeerId;
use capped_demo::scenarios;
use capped_event::CappedEventConfig;
use capped_gossip::StreamMode;
use capped_logging::{CappedSubscriberBuilder, FileConfig, LogConfig};

#[derive(Parser)]
#[command(
    name = "capped-demo",
    about = "Capped, prunable, replicable event logs",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Human-readable logs instead of JSONL
    #[arg(long, global = true)]
    pretty: bool,

    /// Also write JSONL logs to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// TOML config for the local instance (id, warning_line)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push past the warning line and count notifications
    Overflow {
        /// Number of pushes
        #[arg(short, long, default_value = "9")]
        total: usize,

        /// Warning line (overrides the config file)
        #[arg(short, long)]
        warning_line: Option<usize>,
    },

    /// Replicate pushes from the local instance to a second one
    Replicate {
        /// Number of pushes on the origin
        #[arg(short, long, default_value = "9")]
        total: usize,

        /// Name of the receiving instance
        #[arg(long, default_value = "B")]
        replica: String,

        /// Warning line of the receiving instance
        #[arg(short, long, default_value = "5")]
        warning_line: usize,

        /// Stream mode on the origin side
        #[arg(short, long, value_enum, default_value = "duplex")]
        mode: Mode,
    },

    /// Push on a simulated clock, then prune by age and by count
    Prune {
        /// Number of pushes
        #[arg(short, long, default_value = "10")]
        total: usize,

        /// Milliseconds between pushes
        #[arg(short, long, default_value = "20")]
        interval: i64,

        /// Age for the age-based prune (default: half the pushes)
        #[arg(short, long)]
        age: Option<i64>,

        /// Records kept by the count-based prune
        #[arg(short, long, default_value = "1")]
        keep: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Duplex,
    ReadOnly,
    WriteOnly,
}

impl From<Mode> for StreamMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Duplex => StreamMode::Duplex,
            Mode::ReadOnly => StreamMode::ReadOnly,
            Mode::WriteOnly => StreamMode::WriteOnly,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = if cli.pretty {
        LogConfig::development()
    } else {
        LogConfig::default()
    };
    log_config.default_level = if cli.verbose { "debug" } else { "info" }.to_string();
    if let Some(dir) = &cli.log_dir {
        log_config.file = Some(FileConfig {
            directory: dir.clone(),
            ..FileConfig::default()
        });
    }
    let _log_guard = CappedSubscriberBuilder::new()
        .with_config(log_config)
        .init()
        .context("failed to install logging")?;

    let config = match &cli.config {
        Some(path) => CappedEventConfig::<PeerId>::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => CappedEventConfig::new(PeerId::new("A")?),
    };

    match cli.command {
        Commands::Overflow {
            total,
            warning_line,
        } => {
            let config = match warning_line {
                Some(line) => config.with_warning_line(line),
                None => config,
            };
            let report = scenarios::run_overflow(config, total)?;
            print_report(cli.json, &report, || {
                println!(
                    "{} pushed {} values with warning line {}",
                    report.peer, report.pushed, report.warning_line
                );
                println!(
                    "  {} notifications at lengths {:?}",
                    report.notifications.len(),
                    report.notifications
                );
            })?;
        }
        Commands::Replicate {
            total,
            replica,
            warning_line,
            mode,
        } => {
            let report =
                scenarios::run_replication(config, &replica, warning_line, total, mode.into()).await?;
            print_report(cli.json, &report, || {
                println!(
                    "{} -> {}: origin holds {}, replica holds {}",
                    report.origin, report.replica, report.origin_length, report.replica_length
                );
                println!(
                    "  replica warning line {}: {} notifications at lengths {:?}",
                    report.replica_warning_line,
                    report.replica_notifications.len(),
                    report.replica_notifications
                );
                println!("  latest values match: {}", report.latest_value_matches);
            })?;
        }
        Commands::Prune {
            total,
            interval,
            age,
            keep,
        } => {
            let age = age.unwrap_or_else(|| (total - total / 2) as i64 * interval);
            let report = scenarios::run_prune(config, total, interval, age, keep)?;
            print_report(cli.json, &report, || {
                println!(
                    "pushed {} values {}ms apart",
                    report.pushed, report.interval_ms
                );
                println!(
                    "  prune_before({}) left {}",
                    report.age_ms, report.after_prune_before
                );
                println!("  prune_to({}) left {}", keep, report.after_prune_to);
                println!("  latest value: {:?}", report.latest_value);
            })?;
        }
    }

    Ok(())
}

fn print_report<T: Serialize>(json: bool, report: &T, text: impl FnOnce()) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        text();
    }
    Ok(())
}
