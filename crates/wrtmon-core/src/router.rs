// ── Router polling facade ──
//
// Composes one session, one backend parser, and one capability set into
// the unit a scrape iterates over. Reconnect policy lives here and only
// here: update() performs exactly one reconnect attempt per cycle and
// otherwise degrades the router for that cycle, so extraction code can
// always assume a connected session.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};
use wrtmon_ssh::{CommandRunner, SshSession, Transport};

use crate::backend::{Backend, BackendKind};
use crate::capability::{Capability, CapabilitySet};
use crate::error::CoreError;
use crate::model::{
    InterfaceTelemetry, LearnedLayout, RouterIdentity, SystemHealth, TelemetrySnapshot,
};
use crate::system;

/// Poll-cycle state. Probing failures never reach this enum — a router
/// that fails probing is excluded from the fleet instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    Ready,
    /// The last cycle produced no snapshot; the next one retries from the
    /// reconnect step.
    Degraded,
}

/// One polling unit: session + capability set + backend parser.
pub struct Router {
    name: String,
    session: Box<dyn Transport + Send>,
    backend: Box<dyn Backend + Send>,
    capabilities: CapabilitySet,
    /// Working interface set; re-derived between polls when the backend
    /// supports detection and a known interface disappears.
    interfaces: Vec<String>,
    /// Learned station-dump offsets, one per interface.
    layouts: BTreeMap<String, LearnedLayout>,
    state: RouterState,
}

impl Router {
    /// Connect to the router and run capability probing. Any failure here
    /// is terminal for this router for the whole run.
    pub fn connect(identity: &RouterIdentity) -> Result<Self, CoreError> {
        let session = SshSession::new(identity.session_config());
        Self::with_transport(identity.name.clone(), identity.backend, Box::new(session))
    }

    /// Like [`connect`](Self::connect) but over an already-constructed
    /// transport. This is the seam tests drive with scripted runners.
    pub fn with_transport(
        name: String,
        kind: BackendKind,
        mut session: Box<dyn Transport + Send>,
    ) -> Result<Self, CoreError> {
        session.connect()?;

        let mut backend = kind.build();
        let capabilities = backend.probe(&mut *session)?;

        let interfaces = match backend.fixed_interfaces() {
            Some(fixed) => fixed,
            None => {
                let detected = system::detect_wireless_interfaces(&mut *session)?;
                if detected.is_empty() {
                    warn!(router = %name, "no wireless interfaces detected");
                }
                detected
            }
        };

        info!(
            router = %name,
            backend = %kind,
            ?interfaces,
            "router probed and ready"
        );
        Ok(Self {
            name,
            session,
            backend,
            capabilities,
            interfaces,
            layouts: BTreeMap::new(),
            state: RouterState::Ready,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> RouterState {
        self.state
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Run one poll cycle and build a fresh snapshot.
    ///
    /// `None` means this cycle is degraded (reconnect failed or the poll
    /// could not start); the caller omits the router from this scrape and
    /// retries next cycle. A single extraction failure never degrades the
    /// cycle — it only nulls that value.
    pub fn update(&mut self) -> Option<TelemetrySnapshot> {
        if !self.session.is_connected() {
            if let Err(e) = self.session.reconnect() {
                warn!(router = %self.name, error = %e, "reconnect failed, skipping this cycle");
                self.state = RouterState::Degraded;
                return None;
            }
        }

        if let Err(e) = self.refresh_interfaces() {
            warn!(router = %self.name, error = %e, "interface re-detection failed");
            self.state = RouterState::Degraded;
            return None;
        }
        if let Err(e) = self.backend.begin_poll(&mut *self.session) {
            warn!(router = %self.name, error = %e, "poll setup failed");
            self.state = RouterState::Degraded;
            return None;
        }

        let mut snapshot = TelemetrySnapshot::default();
        for interface in self.interfaces.clone() {
            let telemetry = self.poll_interface(&interface);
            snapshot.interfaces.insert(interface, telemetry);
        }
        snapshot.health = self.poll_health();

        self.state = RouterState::Ready;
        Some(snapshot)
    }

    fn poll_interface(&mut self, interface: &str) -> InterfaceTelemetry {
        let mut telemetry = InterfaceTelemetry::default();

        if self.capabilities.supports(Capability::Signal) {
            let layout = self.layouts.remove(interface);
            match self.backend.signal_map(&mut *self.session, interface, layout) {
                Ok((clients, learned)) => {
                    telemetry.clients = clients;
                    if let Some(learned) = learned {
                        self.layouts.insert(interface.to_owned(), learned);
                    }
                }
                Err(e) => {
                    warn!(router = %self.name, interface, error = %e, "signal extraction failed");
                }
            }
        }
        if self.capabilities.supports(Capability::Channel) {
            match self.backend.channel(&mut *self.session, interface) {
                Ok(channel) => telemetry.channel = channel,
                Err(e) => {
                    warn!(router = %self.name, interface, error = %e, "channel extraction failed");
                }
            }
        }
        if self.capabilities.supports(Capability::Counters) {
            match system::interface_counters(&mut *self.session, interface) {
                Ok((rx, tx)) => {
                    telemetry.rx_bytes = rx;
                    telemetry.tx_bytes = tx;
                }
                Err(e) => {
                    warn!(router = %self.name, interface, error = %e, "counter read failed");
                }
            }
        }
        if self.capabilities.supports(Capability::InterfaceTemperature) {
            match self
                .backend
                .interface_temperature(&mut *self.session, interface)
            {
                Ok(temperature) => telemetry.temperature_c = temperature,
                Err(e) => {
                    warn!(router = %self.name, interface, error = %e, "temperature read failed");
                }
            }
        }
        telemetry
    }

    fn poll_health(&mut self) -> SystemHealth {
        let mut health = SystemHealth::default();

        if let Some(support) = self.capabilities.support(Capability::ProcStats) {
            match system::load_average(&mut *self.session) {
                Ok(load) => health.load = Some(load),
                Err(e) => warn!(router = %self.name, error = %e, "loadavg read failed"),
            }
            match system::memory_used_percent(&mut *self.session, support) {
                Ok(pct) => health.memory_used_percent = Some(pct),
                Err(e) => warn!(router = %self.name, error = %e, "meminfo read failed"),
            }
        }
        if self.capabilities.supports(Capability::CpuTemperature) {
            match system::cpu_temperature(&mut *self.session) {
                Ok(temperature) => health.cpu_temperature_c = Some(temperature),
                Err(e) => warn!(router = %self.name, error = %e, "cpu temperature read failed"),
            }
        }
        health
    }

    #[cfg(test)]
    pub(crate) fn replace_session(&mut self, session: Box<dyn Transport + Send>) {
        self.session = session;
    }

    /// If a previously detected interface disappeared, rerun detection
    /// before this poll; unstable firmwares renumber interfaces across
    /// radio restarts.
    fn refresh_interfaces(&mut self) -> Result<(), CoreError> {
        if !self.capabilities.supports(Capability::InterfaceDetection) {
            return Ok(());
        }
        let runner: &mut dyn CommandRunner = &mut *self.session;
        let listing = runner.run_checked("ls /sys/class/net")?;
        let present: BTreeSet<&str> = listing.split_whitespace().collect();
        if self
            .interfaces
            .iter()
            .any(|name| !present.contains(name.as_str()))
        {
            debug!(router = %self.name, "interface set changed, re-running detection");
            self.interfaces = system::detect_wireless_interfaces(&mut *self.session)?;
            self.layouts
                .retain(|name, _| self.interfaces.contains(name));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::model::MacAddress;
    use crate::testing::FakeRunner;
    use pretty_assertions::assert_eq;

    const MEMINFO: &str = "MemTotal: 100 kB\nMemFree: 40 kB\nMemAvailable: 50 kB\n";
    const DUMP: &str = "\
Station AA:BB:CC:DD:EE:FF (on wlan0)
\tinactive time:\t882 ms
\tsignal:  \t-54 dBm
\ttx bitrate:\t144.4 MBit/s
";

    fn station_dump_runner() -> FakeRunner {
        FakeRunner::new()
            .on("iw --version", 0, "iw version 5.9\n")
            .on("cat /proc/meminfo", 0, MEMINFO)
            .on("test -r /sys/class/thermal/thermal_zone0/temp", 1, "")
            .on("ls /sys/class/net", 0, "eth0 lo wlan0\n")
            .on("test -d /sys/class/net/eth0/wireless", 1, "")
            .on("test -d /sys/class/net/lo/wireless", 1, "")
            .on("test -d /sys/class/net/wlan0/wireless", 0, "")
            .on("iw dev wlan0 station dump", 0, DUMP)
            .on("iw dev wlan0 info", 0, "Interface wlan0\n\tchannel 6 (2437 MHz)\n")
            .on("cat /sys/class/net/wlan0/statistics/rx_bytes", 0, "1000\n")
            .on("cat /sys/class/net/wlan0/statistics/tx_bytes", 0, "2000\n")
            .on("cat /proc/loadavg", 0, "0.10 0.20 0.30 1/40 900\n")
    }

    fn station_dump_router(runner: FakeRunner) -> Result<Router, CoreError> {
        Router::with_transport("attic".into(), BackendKind::StationDump, Box::new(runner))
    }

    #[test]
    fn probing_detects_interfaces_and_narrows_capabilities() {
        let router = station_dump_router(station_dump_runner()).unwrap();
        assert_eq!(router.interfaces(), ["wlan0"]);
        assert!(router.capabilities().supports(Capability::Signal));
        assert!(router.capabilities().supports(Capability::ProcStats));
        assert!(!router.capabilities().supports(Capability::CpuTemperature));
    }

    #[test]
    fn update_builds_full_snapshot() {
        let mut router = station_dump_router(station_dump_runner()).unwrap();
        let snapshot = router.update().expect("snapshot");

        let wlan0 = &snapshot.interfaces["wlan0"];
        assert_eq!(
            wlan0.clients[&MacAddress::new("AA:BB:CC:DD:EE:FF")],
            Some(-54)
        );
        assert_eq!(wlan0.channel, Some(6));
        assert_eq!(wlan0.rx_bytes, Some(1000));
        assert_eq!(wlan0.tx_bytes, Some(2000));
        assert_eq!(snapshot.health.memory_used_percent, Some(50.0));
        assert_eq!(snapshot.health.load.unwrap().five, 0.20);
        // Unsupported capability stays absent, not zero.
        assert_eq!(snapshot.health.cpu_temperature_c, None);
        assert_eq!(router.state(), RouterState::Ready);
    }

    #[test]
    fn missing_command_is_fatal_to_probing() {
        let runner = FakeRunner::new().on("iw --version", 127, "");
        assert!(matches!(
            station_dump_router(runner),
            Err(CoreError::MissingCommand { .. })
        ));
    }

    #[test]
    fn failed_reconnect_degrades_one_cycle_then_recovers() {
        let mut router = station_dump_router(station_dump_runner()).unwrap();

        // Swap in a dropped session whose first reconnect attempt fails.
        router.session = Box::new(station_dump_runner().disconnected().failing_connects(1));

        assert_eq!(router.update(), None);
        assert_eq!(router.state(), RouterState::Degraded);

        // Next cycle reconnects and polls normally.
        let snapshot = router.update().expect("recovered snapshot");
        assert_eq!(router.state(), RouterState::Ready);
        assert_eq!(snapshot.interfaces.len(), 1);
    }

    #[test]
    fn single_extraction_failure_nulls_only_that_value() {
        let runner = station_dump_runner()
            .on("iw dev wlan0 info", 1, "") // scripted twice: probe uses none, poll gets first entry
            ;
        // The queue now holds [good, failing]; first poll consumes the
        // good entry, second poll sees the failure.
        let mut router = station_dump_router(runner).unwrap();
        let first = router.update().expect("first snapshot");
        assert_eq!(first.interfaces["wlan0"].channel, Some(6));

        let second = router.update().expect("second snapshot");
        assert_eq!(second.interfaces["wlan0"].channel, None);
        // Signal still present — the failure stayed local.
        assert!(!second.interfaces["wlan0"].clients.is_empty());
        assert_eq!(router.state(), RouterState::Ready);
    }

    #[test]
    fn disappeared_interface_triggers_redetection() {
        let runner = FakeRunner::new()
            .on("iw --version", 0, "iw version 5.9\n")
            .on("cat /proc/meminfo", 0, MEMINFO)
            .on("test -r /sys/class/thermal/thermal_zone0/temp", 1, "")
            // Probe-time listing shows wlan0; poll-time listing shows it
            // replaced by wlan1.
            .on("ls /sys/class/net", 0, "lo wlan0\n")
            .on("ls /sys/class/net", 0, "lo wlan1\n")
            .on("test -d /sys/class/net/lo/wireless", 1, "")
            .on("test -d /sys/class/net/wlan0/wireless", 0, "")
            .on("test -d /sys/class/net/wlan1/wireless", 0, "")
            .on("iw dev wlan1 station dump", 0, "")
            .on("iw dev wlan1 info", 0, "")
            .on("cat /sys/class/net/wlan1/statistics/rx_bytes", 0, "1\n")
            .on("cat /sys/class/net/wlan1/statistics/tx_bytes", 0, "2\n")
            .on("cat /proc/loadavg", 0, "0.1 0.1 0.1 1/2 3\n");

        let mut router = station_dump_router(runner).unwrap();
        assert_eq!(router.interfaces(), ["wlan0"]);

        let snapshot = router.update().expect("snapshot");
        assert_eq!(router.interfaces(), ["wlan1"]);
        assert!(snapshot.interfaces.contains_key("wlan1"));
        assert!(!snapshot.interfaces.contains_key("wlan0"));
    }
}
