//! Command-line interface for echogate
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Voice-gated audio passthrough for enrolled speakers
#[derive(Parser, Debug)]
#[command(
    name = "echogate",
    version,
    about = "Voice-gated audio passthrough for enrolled speakers"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: gate decisions, -vv: full diagnostics)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Audio input device (e.g., hw:0)
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Enrolled voice sample WAV (overrides config)
    #[arg(long, value_name = "PATH")]
    pub voice_sample: Option<PathBuf>,

    /// Disable speaker verification (all speech passes)
    #[arg(long)]
    pub no_verify: bool,

    /// Disable wake-phrase detection and ambient mode
    #[arg(long)]
    pub no_wake: bool,

    /// Ambient window duration. Examples: 5s, 90s, 2m
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_secs)]
    pub ambient_duration: Option<u64>,
}

/// Parse a duration string into seconds.
///
/// Supports any duration format accepted by `humantime`: bare numbers (seconds),
/// single-unit (`30s`, `5m`, `2h`), and compound (`1h30m`, `2m30s`).
fn parse_duration_secs(s: &str) -> Result<u64, String> {
    let s = s.trim();
    // Bare number → seconds
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(secs);
    }
    humantime::parse_duration(s)
        .map(|d| d.as_secs())
        .map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available audio input devices
    Devices,

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ConfigAction {
    /// Print the resolved configuration (file + env + flags)
    Show,
    /// Print the path the configuration is loaded from
    Path,
}
