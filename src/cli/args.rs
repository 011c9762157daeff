//! CLI argument definitions using clap
//!
//! Commands:
//! - custodia health --config <path>
//! - custodia snapshot --config <path> [--description <text>] [--incremental]
//! - custodia list --config <path>
//! - custodia verify --config <path> --id <snapshot>
//! - custodia restore --config <path> --id <snapshot> [--target <path>]
//! - custodia prune --config <path>
//! - custodia schedule --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Custodia - lifecycle manager for a relational store
#[derive(Parser, Debug)]
#[command(name = "custodia")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the health check battery and write a report
    Health {
        /// Path to configuration file
        #[arg(long, default_value = "./custodia.json")]
        config: PathBuf,
    },

    /// Create a snapshot of the live store
    Snapshot {
        /// Path to configuration file
        #[arg(long, default_value = "./custodia.json")]
        config: PathBuf,

        /// Free-text description recorded in the sidecar
        #[arg(long, default_value = "manual snapshot")]
        description: String,

        /// Skip the snapshot if the store is unchanged since the last one
        #[arg(long)]
        incremental: bool,
    },

    /// List registered snapshots, newest first
    List {
        /// Path to configuration file
        #[arg(long, default_value = "./custodia.json")]
        config: PathBuf,
    },

    /// Verify a snapshot's checksum and structural integrity
    Verify {
        /// Path to configuration file
        #[arg(long, default_value = "./custodia.json")]
        config: PathBuf,

        /// Snapshot id to verify
        #[arg(long)]
        id: String,
    },

    /// Restore a snapshot onto the live store (or another target)
    Restore {
        /// Path to configuration file
        #[arg(long, default_value = "./custodia.json")]
        config: PathBuf,

        /// Snapshot id to restore
        #[arg(long)]
        id: String,

        /// Restore destination; defaults to the live store path
        #[arg(long)]
        target: Option<PathBuf>,
    },

    /// Apply the retention policy and delete expired snapshots
    Prune {
        /// Path to configuration file
        #[arg(long, default_value = "./custodia.json")]
        config: PathBuf,
    },

    /// Run the scheduled backup jobs until interrupted
    Schedule {
        /// Path to configuration file
        #[arg(long, default_value = "./custodia.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
