//! Command-line interface.

use clap::Parser;
use std::path::PathBuf;

/// Team workflow server with permission-gated task lifecycles and live
/// per-workflow event fan-out.
#[derive(Parser, Debug)]
#[command(name = "crewflow", version, about)]
pub struct Cli {
    /// Path to a YAML config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database (overrides config).
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Port for the HTTP API (overrides config).
    #[arg(long)]
    pub port: Option<u16>,

    /// Address to bind to (overrides config).
    #[arg(long)]
    pub bind: Option<String>,
}
