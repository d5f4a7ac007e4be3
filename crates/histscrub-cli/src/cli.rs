use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "histscrub")]
#[command(
    about = "Scrub leaked credentials from every branch and tag of a git repository",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Repository to remediate
    #[arg(long, global = true, default_value = ".")]
    pub repo: PathBuf,

    /// Config file (default: histscrub.toml in the repository root)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Write the run result as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter histscrub.toml into the repository root
    Init,

    /// Re-run the verification scan against an existing snapshot
    Verify {
        /// Snapshot produced by a previous run
        #[arg(long)]
        snapshot: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}
