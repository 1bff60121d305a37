//! CLI parse: clap types for Shotforge. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Shotforge CLI - inspect packs, catalogs and studio configuration
#[derive(Parser)]
#[command(name = "shotforge")]
#[command(about = "Generation orchestration core for the visual content studio")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List every pack with its job count
    Packs {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the ordered shot jobs a pack expands into
    Expand {
        /// Pack kind (essential, plus, social, complete)
        pack: String,
        /// Session aspect ratio for e-commerce shots
        #[arg(long, default_value = "3:4")]
        aspect_ratio: String,
        /// Expand for a session without a model image
        #[arg(long)]
        product_only: bool,
        /// TOML catalog to expand against (default: configured or built-in)
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the effective configuration as TOML
    Config,
}
