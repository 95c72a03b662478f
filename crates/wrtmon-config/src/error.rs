use std::path::PathBuf;

use thiserror::Error;

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    // ── Loading ─────────────────────────────────────────────────────
    #[error("failed to load configuration: {0}")]
    Figment(#[from] figment::Error),

    #[error("configuration I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ── Validation ──────────────────────────────────────────────────
    #[error("invalid configuration for {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("refusing to overwrite existing config at {path}")]
    AlreadyExists { path: PathBuf },
}
