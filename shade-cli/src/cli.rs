//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shade_core::NamespaceId;

#[derive(Parser)]
#[command(name = "shade")]
#[command(about = "Shadow namespace diagnostics", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the process configuration
    Config {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether a module is loaded into a namespace
    Probe {
        /// Namespace id (0 for the base namespace)
        #[arg(short, long, default_value = "0")]
        namespace: NamespaceId,

        /// Resolve all symbols (RTLD_NOW) instead of lazily
        #[arg(long)]
        now: bool,

        /// Module file name or path
        file: PathBuf,
    },

    /// Show the module hosting this program
    Host,

    /// Show version information
    Version,
}
