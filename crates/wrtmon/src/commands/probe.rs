//! `wrtmon probe` — one-shot capability report, for config debugging.

use wrtmon_core::{Router, Support};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let config = super::load_config(global)?;
    let identities = wrtmon_config::router_identities(&config);
    if identities.is_empty() {
        return Err(CliError::NoRouters);
    }

    tokio::task::spawn_blocking(move || {
        for identity in &identities {
            match Router::connect(identity) {
                Ok(router) => {
                    println!(
                        "{} ({} backend, interfaces: {})",
                        router.name(),
                        router.backend_kind(),
                        router.interfaces().join(", ")
                    );
                    for (capability, support) in router.capabilities().iter_supported() {
                        let marker = match support {
                            Support::Full => "",
                            Support::Partial => " (partial)",
                        };
                        println!("  {capability}{marker}");
                    }
                }
                Err(e) => println!("{}: probe failed: {e}", identity.name),
            }
            println!();
        }
    })
    .await
    .map_err(|e| CliError::Task {
        reason: e.to_string(),
    })
}
