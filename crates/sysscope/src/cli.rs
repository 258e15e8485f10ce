//! CLI - Command-line argument parsing
//!
//! Keeps argument parsing separate from execution logic.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// sysscope CLI
#[derive(Parser, Debug)]
#[command(name = "sysscope")]
#[command(about = "Collect a categorized snapshot of this host", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Configuration file (overrides $SYSSCOPE_CONFIG and the default location)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level or filter directive for stderr logging (overrides $RUST_LOG)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Collect and print a categorized report
    Collect {
        /// Print only the first 10 facts
        #[arg(long, conflicts_with = "json")]
        summary: bool,

        /// Print the raw snapshot as JSON
        #[arg(long)]
        json: bool,

        /// Also write the paginated document to FILE
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Disable colour
        #[arg(long)]
        no_color: bool,
    },

    /// List registered probes with eligibility on this host
    Probes,

    /// Print the effective configuration as TOML
    Config,
}
