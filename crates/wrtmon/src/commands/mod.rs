pub mod config_cmd;
pub mod probe;
pub mod serve;

use std::path::PathBuf;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolve the config path from the flag or platform conventions.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(wrtmon_config::config_path)
}

pub fn load_config(global: &GlobalOpts) -> Result<wrtmon_config::Config, CliError> {
    Ok(wrtmon_config::load_config(&config_path(global))?)
}
