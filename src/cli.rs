//! CLI argument parsing for tracepack

use crate::config::TruncationPolicy;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for `dump`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// One JSON object per line
    Json,
    /// Encoded record bytes, hex-encoded, one record per line
    Hex,
}

#[derive(Parser, Debug)]
#[command(name = "tracepack")]
#[command(version)]
#[command(about = "Pack, dump and summarize compact trace event files", long_about = None)]
pub struct Cli {
    /// Load settings from a TOML file
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Handling of payloads longer than 65535 elements (overrides the config file)
    #[arg(long, value_enum, global = true)]
    pub truncation: Option<TruncationPolicy>,

    /// Enable debug tracing output on stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert a JSON array of records into a trace file
    Pack {
        /// JSON input file
        input: PathBuf,

        /// Trace file to write
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Print every record of a trace file
    Dump {
        file: PathBuf,

        #[arg(long = "format", value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Summarize payload storage of a trace file
    Stats {
        file: PathBuf,

        /// Emit the summary as JSON
        #[arg(long)]
        json: bool,
    },
}
