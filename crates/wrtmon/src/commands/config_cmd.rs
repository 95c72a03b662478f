//! `wrtmon init-config` — write a starter configuration file.

use crate::cli::{GlobalOpts, InitConfigArgs};
use crate::error::CliError;

pub fn handle(args: InitConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = args.path.unwrap_or_else(|| super::config_path(global));
    wrtmon_config::write_example_config(&path)?;
    println!("wrote {}", path.display());
    Ok(())
}
