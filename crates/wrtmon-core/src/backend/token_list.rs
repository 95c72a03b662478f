// ── Token-list backend (DD-WRT `wl` / `wl_atheros`) ──
//
// `<cmd> assoclist` prints one line of whitespace-separated MAC tokens,
// optionally prefixed by literal `assoclist` marker tokens. Each client is
// then queried individually with `<cmd> rssi <mac>`, whose answer carries
// the signal as a trailing numeric token. Which of the two mutually
// exclusive binaries exists is probed once and cached for the facade
// lifetime.

use std::collections::BTreeSet;

use tracing::debug;
use wrtmon_ssh::CommandRunner;

use crate::backend::{Backend, BackendKind};
use crate::capability::{Capability, CapabilitySet, Support};
use crate::error::CoreError;
use crate::model::{ClientSignalMap, LearnedLayout, MacAddress};
use crate::system;

const CANDIDATE_COMMANDS: [&str; 2] = ["wl", "wl_atheros"];

/// Marker token the firmware prefixes to the client list.
const ASSOCLIST_MARKER: &str = "assoclist";

/// The radio `wl` operates on; DD-WRT does not expose discovery for it.
const FIXED_INTERFACE: &str = "wl0";

#[derive(Debug, Default)]
pub struct TokenListBackend {
    /// Diagnostic binary chosen at probe time (`wl` or `wl_atheros`).
    command: Option<String>,
}

impl TokenListBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn command(&self) -> Result<&str, CoreError> {
        self.command.as_deref().ok_or_else(|| CoreError::Probe {
            message: "token-list backend used before probing".into(),
        })
    }
}

impl Backend for TokenListBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::TokenList
    }

    fn implemented(&self) -> BTreeSet<Capability> {
        [
            Capability::Signal,
            Capability::ProcStats,
            Capability::InterfaceTemperature,
            Capability::CpuTemperature,
        ]
        .into()
    }

    fn probe(&mut self, runner: &mut dyn CommandRunner) -> Result<CapabilitySet, CoreError> {
        for candidate in CANDIDATE_COMMANDS {
            if runner.run(&format!("{candidate} ver"))?.success() {
                debug!(command = candidate, "diagnostic binary found");
                self.command = Some(candidate.to_owned());
                break;
            }
        }
        let Some(command) = self.command.clone() else {
            return Err(CoreError::MissingCommand {
                tried: CANDIDATE_COMMANDS.map(String::from).to_vec(),
            });
        };

        let mut capabilities = CapabilitySet::new(self.implemented());
        capabilities.mark(Capability::Signal, Support::Full);

        if let Some(support) = system::probe_meminfo(runner) {
            capabilities.mark(Capability::ProcStats, support);
        }
        if system::probe_cpu_temperature(runner) {
            capabilities.mark(Capability::CpuTemperature, Support::Full);
        }
        if runner.run(&format!("{command} phy_tempsense"))?.success() {
            capabilities.mark(Capability::InterfaceTemperature, Support::Full);
        }
        Ok(capabilities)
    }

    fn fixed_interfaces(&self) -> Option<Vec<String>> {
        Some(vec![FIXED_INTERFACE.to_owned()])
    }

    fn signal_map(
        &mut self,
        runner: &mut dyn CommandRunner,
        _interface: &str,
        _layout: Option<LearnedLayout>,
    ) -> Result<(ClientSignalMap, Option<LearnedLayout>), CoreError> {
        let command = self.command()?.to_owned();
        let listing = runner.run_checked(&format!("{command} assoclist"))?;

        let mut clients = ClientSignalMap::new();
        for mac in parse_assoclist(&listing) {
            // One unreadable client must not abort the poll.
            let signal = match runner.run(&format!("{command} rssi {mac}")) {
                Ok(output) if output.success() => parse_trailing_i32(&output.stdout),
                Ok(_) => None,
                Err(e) if e.is_connection_lost() => return Err(e.into()),
                Err(_) => None,
            };
            clients.insert(mac, signal);
        }
        Ok((clients, None))
    }

    fn channel(
        &mut self,
        _runner: &mut dyn CommandRunner,
        _interface: &str,
    ) -> Result<Option<u32>, CoreError> {
        Ok(None)
    }

    fn interface_temperature(
        &mut self,
        runner: &mut dyn CommandRunner,
        _interface: &str,
    ) -> Result<Option<f64>, CoreError> {
        let command = self.command()?.to_owned();
        let output = runner.run_checked(&format!("{command} phy_tempsense"))?;
        Ok(parse_tempsense(&output))
    }
}

/// Split the `assoclist` answer into client addresses, dropping marker
/// tokens. Empty output means no clients.
pub fn parse_assoclist(output: &str) -> Vec<MacAddress> {
    output
        .split_whitespace()
        .filter(|token| *token != ASSOCLIST_MARKER)
        .map(MacAddress::new)
        .collect()
}

/// The signal value is the last whitespace-separated token of the `rssi`
/// answer.
pub fn parse_trailing_i32(output: &str) -> Option<i32> {
    output.split_whitespace().last()?.parse().ok()
}

/// `phy_tempsense` reports in half-degree units, first token.
pub fn parse_tempsense(output: &str) -> Option<f64> {
    let raw: f64 = output.split_whitespace().next()?.parse().ok()?;
    Some(raw * 0.5)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::FakeRunner;
    use pretty_assertions::assert_eq;

    #[test]
    fn assoclist_strips_marker_and_keeps_all_clients() {
        let macs = parse_assoclist("assoclist AA:BB:CC:DD:EE:FF assoclist 11:22:33:44:55:66\n");
        assert_eq!(
            macs,
            vec![
                MacAddress::new("AA:BB:CC:DD:EE:FF"),
                MacAddress::new("11:22:33:44:55:66")
            ]
        );
    }

    #[test]
    fn empty_assoclist_means_no_clients() {
        assert!(parse_assoclist("").is_empty());
        assert!(parse_assoclist("  \n").is_empty());
    }

    #[test]
    fn rssi_answer_uses_trailing_token() {
        assert_eq!(parse_trailing_i32("rssi is -82\n"), Some(-82));
        assert_eq!(parse_trailing_i32("-67"), Some(-67));
        assert_eq!(parse_trailing_i32("rssi is unknown"), None);
    }

    #[test]
    fn signal_map_scenario_single_client() {
        let mut runner = FakeRunner::new()
            .on("wl assoclist", 0, "assoclist AA:BB:CC:DD:EE:FF\n")
            .on("wl rssi AA:BB:CC:DD:EE:FF", 0, "rssi is -82\n");
        let mut backend = TokenListBackend {
            command: Some("wl".into()),
        };

        let (clients, layout) = backend
            .signal_map(&mut runner, FIXED_INTERFACE, None)
            .unwrap();
        assert_eq!(layout, None);
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[&MacAddress::new("AA:BB:CC:DD:EE:FF")], Some(-82));
    }

    #[test]
    fn per_client_rssi_failure_yields_null_signal() {
        let mut runner = FakeRunner::new()
            .on(
                "wl assoclist",
                0,
                "assoclist AA:BB:CC:DD:EE:FF 11:22:33:44:55:66\n",
            )
            .on("wl rssi AA:BB:CC:DD:EE:FF", 1, "")
            .on("wl rssi 11:22:33:44:55:66", 0, "-55\n");
        let mut backend = TokenListBackend {
            command: Some("wl".into()),
        };

        let (clients, _) = backend
            .signal_map(&mut runner, FIXED_INTERFACE, None)
            .unwrap();
        assert_eq!(clients[&MacAddress::new("AA:BB:CC:DD:EE:FF")], None);
        assert_eq!(clients[&MacAddress::new("11:22:33:44:55:66")], Some(-55));
    }

    #[test]
    fn probe_falls_back_to_atheros_binary() {
        let mut runner = FakeRunner::new()
            .on("wl ver", 127, "")
            .on("wl_atheros ver", 0, "5.10.56\n")
            .on("wl_atheros phy_tempsense", 1, "")
            .on("cat /proc/meminfo", 0, "MemTotal: 1 kB\nMemFree: 1 kB\n")
            .on("test -r /sys/class/thermal/thermal_zone0/temp", 1, "");
        let mut backend = TokenListBackend::new();

        let capabilities = backend.probe(&mut runner).unwrap();
        assert_eq!(backend.command.as_deref(), Some("wl_atheros"));
        assert!(capabilities.supports(Capability::Signal));
        assert!(capabilities.is_tainted(Capability::ProcStats));
        assert!(!capabilities.supports(Capability::CpuTemperature));
        assert!(!capabilities.supports(Capability::InterfaceTemperature));
    }

    #[test]
    fn probe_with_neither_binary_is_missing_command() {
        let mut runner = FakeRunner::new()
            .on("wl ver", 127, "")
            .on("wl_atheros ver", 127, "");
        let err = TokenListBackend::new().probe(&mut runner).unwrap_err();
        assert!(matches!(err, CoreError::MissingCommand { .. }));
    }

    #[test]
    fn tempsense_is_half_degree_units() {
        assert_eq!(parse_tempsense("86 (0x56)\n"), Some(43.0));
    }
}
