//! Command-line interface for ncapi-rs.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Inspect and run Neural Compute devices through the NCSDK v2 driver.
#[derive(Parser, Debug)]
#[command(name = "ncapi")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to optional config file (YAML).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the driver library. Overrides the config file.
    #[arg(short, long, global = true)]
    pub library: Option<PathBuf>,

    /// Output format (json, pretty).
    #[arg(short, long, global = true, default_value = "json")]
    pub format: String,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Subcommands of the `ncapi` binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List attached devices.
    Devices,

    /// Open a device and print its telemetry.
    Info {
        /// Device index.
        #[arg(short, long, default_value_t = 0)]
        index: i32,
    },

    /// Run one inference through a compiled graph.
    Infer {
        /// Path to the compiled graph file.
        #[arg(short, long)]
        graph: PathBuf,

        /// Path to input data file (JSON with tensor data).
        #[arg(short, long)]
        input: PathBuf,

        /// Device index.
        #[arg(short = 'd', long, default_value_t = 0)]
        index: i32,
    },
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
