//! Binary error type with miette diagnostics and exit codes.

use miette::Diagnostic;
use thiserror::Error;

use wrtmon_config::ConfigError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(wrtmon::config),
        help("Create a starter config with: wrtmon init-config")
    )]
    Config(#[from] ConfigError),

    #[error("no routers configured")]
    #[diagnostic(
        code(wrtmon::no_routers),
        help("Add at least one [routers.<name>] table to wrtmon.toml.")
    )]
    NoRouters,

    // ── Serving ──────────────────────────────────────────────────────
    #[error("failed to bind {listen}")]
    #[diagnostic(
        code(wrtmon::bind),
        help("Is another exporter already listening on this address?")
    )]
    Bind {
        listen: String,
        #[source]
        source: std::io::Error,
    },

    #[error("metrics server error")]
    #[diagnostic(code(wrtmon::serve))]
    Serve(#[source] std::io::Error),

    #[error("background task failed: {reason}")]
    #[diagnostic(code(wrtmon::task))]
    Task { reason: String },
}

impl CliError {
    /// Map this error to a process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => exit_code::CONFIG,
            Self::NoRouters => exit_code::USAGE,
            Self::Bind { .. } | Self::Serve(_) => exit_code::CONNECTION,
            _ => exit_code::GENERAL,
        }
    }
}
