use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ptrack",
    about = "PlayerTrack: categories, social lists and visibility sync",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML runtime config; defaults apply when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// How command results are printed.
#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Feed roster snapshots through a fresh in-memory tracker
    Replay(ReplayArgs),
    /// Work with visibility list dumps
    Visibility(VisibilityArgs),
    /// Inspect runtime configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct ReplayArgs {
    /// JSON file holding an array of snapshots
    pub path: PathBuf,
    /// Create players for members that are not tracked yet
    #[arg(long)]
    pub add_players: bool,
    /// Keep a dynamic category per list
    #[arg(long)]
    pub sync_categories: bool,
}

#[derive(Args)]
pub struct VisibilityArgs {
    #[command(subcommand)]
    pub action: VisibilityAction,
}

#[derive(Subcommand)]
pub enum VisibilityAction {
    /// Parse a list dump, one entry per line
    Parse { path: PathBuf },
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
}
