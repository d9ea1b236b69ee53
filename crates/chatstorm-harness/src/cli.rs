//! Command line for the `chatstorm-harness` binary.

use clap::{Parser, ValueEnum};

pub const DEFAULT_CONFIG: &str = "chatstorm.yaml";

/// Chat protocol load and fuzz harness
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// What to run
    #[arg(value_enum, default_value_t = Mode::Fleet)]
    pub mode: Mode,

    /// YAML configuration file
    #[arg(value_name = "CONFIG", default_value = DEFAULT_CONFIG)]
    pub config: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Spawn the configured clients and log their transcripts until Ctrl+C
    Fleet,
    /// Send the two hostile frames once and log the verdict
    Fuzz,
}
