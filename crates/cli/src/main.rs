//! Performance envelope CLI
//!
//! A command-line tool for inspecting a persisted threshold model,
//! adjusting the latency-critical utilization ceiling and previewing
//! utilization bands.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{lcutil, thresholds, workloads};
use model_lib::{THRESH_FILE, UTIL_BIN_STEP};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Performance envelope CLI
#[derive(Parser)]
#[command(name = "penv")]
#[command(author, version, about = "Inspect workload performance envelope models", long_about = None)]
pub struct Cli {
    /// Path to the persisted threshold model
    #[arg(long, env = "PENV_THRESHOLD_FILE", default_value = THRESH_FILE)]
    pub thresholds: PathBuf,

    /// Path to the workload metadata file
    #[arg(long, env = "PENV_WORKLOAD_FILE")]
    pub workloads: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show band thresholds of a job, or a summary of all jobs
    Show {
        /// Job name
        job: Option<String>,
    },

    /// Show the TDP frequency floor of a job
    Tdp {
        /// Job name
        job: String,
    },

    /// Show the latency-critical utilization ceiling
    LcUtil,

    /// Overwrite the latency-critical utilization ceiling
    SetLcUtil {
        /// New ceiling, in percent of one CPU
        value: f64,
    },

    /// Preview the utilization bands of a CPU allocation
    Partition {
        /// Allocated CPUs
        cpus: u32,

        /// Band width
        #[arg(long, default_value_t = UTIL_BIN_STEP)]
        step: f64,
    },

    /// List workload metadata
    Workloads,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Show { job } => {
            thresholds::show(&cli.thresholds, job.as_deref(), cli.format)?;
        }
        Commands::Tdp { job } => {
            thresholds::show_tdp(&cli.thresholds, &job, cli.format)?;
        }
        Commands::LcUtil => {
            lcutil::show(&cli.thresholds, cli.format)?;
        }
        Commands::SetLcUtil { value } => {
            lcutil::set(&cli.thresholds, value, cli.format)?;
        }
        Commands::Partition { cpus, step } => {
            workloads::show_partition(cpus, step, cli.format)?;
        }
        Commands::Workloads => {
            workloads::list(cli.workloads.as_deref(), cli.format)?;
        }
    }

    Ok(())
}
