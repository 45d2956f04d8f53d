//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Local theme and extension development session
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: themedev.toml)
    #[arg(short = 'C', long, global = true, default_value = "themedev.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start a dev session: sync, render proxy, live reload and draft pushes
    #[command(visible_alias = "d")]
    Dev {
        #[command(flatten)]
        args: DevArgs,
    },
}

/// `dev` command arguments.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct DevArgs {
    /// Theme root directory (default: directory of the config file)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub root: Option<PathBuf>,

    /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
    #[arg(short, long)]
    pub interface: Option<std::net::IpAddr>,

    /// Port number for the preview server
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Keep local files when they are deleted remotely
    #[arg(long)]
    pub no_delete: bool,

    /// Only sync keys matching these glob patterns
    #[arg(short, long, value_name = "PATTERN")]
    pub only: Vec<String>,

    /// Skip keys matching these glob patterns
    #[arg(short = 'x', long, value_name = "PATTERN")]
    pub ignore: Vec<String>,

    /// Remote checksum poll interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub poll_interval: Option<u64>,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long)]
    pub verbose: bool,
}

impl Cli {
    pub fn dev_args(&self) -> &DevArgs {
        match &self.command {
            Commands::Dev { args } => args,
        }
    }
}
