// ── Structured-report backend (OpenWrt `ubus`/iwinfo) ──
//
// The one firmware family that answers in a machine-readable format:
// `ubus call iwinfo assoclist` returns a JSON array of station objects,
// mapped straight onto the signal map with no text scraping.

use std::collections::BTreeSet;

use serde::Deserialize;
use wrtmon_ssh::CommandRunner;

use crate::backend::{Backend, BackendKind};
use crate::capability::{Capability, CapabilitySet, Support};
use crate::error::CoreError;
use crate::model::{ClientSignalMap, LearnedLayout, MacAddress};
use crate::system;

#[derive(Debug, Deserialize)]
struct AssoclistReply {
    #[serde(default)]
    results: Vec<StationEntry>,
}

#[derive(Debug, Deserialize)]
struct StationEntry {
    mac: String,
    signal: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct InfoReply {
    channel: Option<u32>,
}

/// Map the station array onto a signal map. Duplicate entries overwrite.
pub fn parse_assoclist_json(body: &str) -> Result<ClientSignalMap, CoreError> {
    let reply: AssoclistReply = serde_json::from_str(body).map_err(|e| CoreError::Parse {
        message: format!("assoclist reply: {e}"),
    })?;
    Ok(reply
        .results
        .into_iter()
        .map(|entry| (MacAddress::new(entry.mac), entry.signal))
        .collect())
}

pub fn parse_info_json(body: &str) -> Result<Option<u32>, CoreError> {
    let reply: InfoReply = serde_json::from_str(body).map_err(|e| CoreError::Parse {
        message: format!("iwinfo reply: {e}"),
    })?;
    Ok(reply.channel)
}

#[derive(Debug, Default)]
pub struct StructuredBackend;

impl StructuredBackend {
    pub fn new() -> Self {
        Self
    }

    fn call(method: &str, interface: &str) -> String {
        format!(r#"ubus call iwinfo {method} '{{"device":"{interface}"}}'"#)
    }
}

impl Backend for StructuredBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::StructuredReport
    }

    fn implemented(&self) -> BTreeSet<Capability> {
        [
            Capability::InterfaceDetection,
            Capability::Signal,
            Capability::Channel,
            Capability::Counters,
            Capability::ProcStats,
            Capability::CpuTemperature,
        ]
        .into()
    }

    fn probe(&mut self, runner: &mut dyn CommandRunner) -> Result<CapabilitySet, CoreError> {
        if !runner.run("ubus list iwinfo")?.success() {
            return Err(CoreError::MissingCommand {
                tried: vec!["ubus".into()],
            });
        }

        let mut capabilities = CapabilitySet::new(self.implemented());
        capabilities.mark(Capability::InterfaceDetection, Support::Full);
        capabilities.mark(Capability::Signal, Support::Full);
        capabilities.mark(Capability::Channel, Support::Full);
        capabilities.mark(Capability::Counters, Support::Full);
        if let Some(support) = system::probe_meminfo(runner) {
            capabilities.mark(Capability::ProcStats, support);
        }
        if system::probe_cpu_temperature(runner) {
            capabilities.mark(Capability::CpuTemperature, Support::Full);
        }
        Ok(capabilities)
    }

    fn signal_map(
        &mut self,
        runner: &mut dyn CommandRunner,
        interface: &str,
        _layout: Option<LearnedLayout>,
    ) -> Result<(ClientSignalMap, Option<LearnedLayout>), CoreError> {
        let body = runner.run_checked(&Self::call("assoclist", interface))?;
        Ok((parse_assoclist_json(&body)?, None))
    }

    fn channel(
        &mut self,
        runner: &mut dyn CommandRunner,
        interface: &str,
    ) -> Result<Option<u32>, CoreError> {
        let body = runner.run_checked(&Self::call("info", interface))?;
        parse_info_json(&body)
    }
}
