//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "wrtmon",
    about = "Prometheus exporter for consumer router telemetry over SSH",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to wrtmon.toml (defaults to the platform config directory).
    #[arg(short, long, global = true, env = "WRTMON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the /metrics endpoint, polling routers on every scrape.
    Serve(ServeArgs),

    /// Connect to every configured router once and print its probed
    /// capability report.
    Probe,

    /// Write a starter configuration file.
    InitConfig(InitConfigArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Bind address, overriding `exporter.listen` from the config.
    #[arg(short, long)]
    pub listen: Option<String>,
}

#[derive(Debug, Args)]
pub struct InitConfigArgs {
    /// Destination path (defaults to the platform config directory).
    pub path: Option<PathBuf>,
}
