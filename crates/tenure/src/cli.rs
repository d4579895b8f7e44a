//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use tenure_core::types::RenewalMode;

/// Tenure - keep Vault leases alive
#[derive(Parser, Debug)]
#[command(name = "tenure")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress log output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a config file, layered over ~/.tenure/config.yaml
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read a secret once and print its flattened keys
    Get(GetArgs),

    /// Keep secrets leased and report lease events until interrupted
    Watch(WatchArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Secret path, e.g. database/creds/app
    pub path: String,

    /// Print secret values instead of masking them
    #[arg(long)]
    pub show_values: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Revoke the lease after printing
    #[arg(long)]
    pub revoke: bool,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Secret path to watch in addition to the configured secrets (repeatable)
    #[arg(short, long = "path")]
    pub paths: Vec<String>,

    /// Renewal mode for --path secrets: once, renew or rotate
    #[arg(short, long, default_value = "renew")]
    pub mode: RenewalMode,

    /// Skip --path secrets that do not exist instead of failing
    #[arg(long)]
    pub ignore_not_found: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration with the token redacted
    Show(ConfigShowArgs),

    /// Validate the configuration
    Validate,
}

#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
