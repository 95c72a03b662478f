// ── Station-dump backend (`iw`) ──
//
// `iw dev <if> station dump` prints one block per associated station,
// each starting with a `Station <mac> (on <if>)` marker and containing a
// `signal:` line at some firmware-dependent offset. The parser learns the
// block stride and the marker→signal distance on the first cold scan,
// then indexes directly into later dumps instead of re-scanning every
// line. Any validation failure in optimized mode discards the learned
// layout and cold-rescans the same input — format drift must never
// produce a bad value or an error.

use std::collections::BTreeSet;

use tracing::debug;
use wrtmon_ssh::CommandRunner;

use crate::backend::{Backend, BackendKind};
use crate::capability::{Capability, CapabilitySet, Support};
use crate::error::CoreError;
use crate::model::{ClientSignalMap, LearnedLayout, MacAddress};
use crate::system;

const STATION_MARKER: &str = "Station ";
const SIGNAL_MARKER: &str = "signal:";

/// Result of one parse pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub clients: ClientSignalMap,
    /// Layout to use for the next poll. `None` after a cold scan that saw
    /// fewer than two blocks, or after a validation failure.
    pub layout: Option<LearnedLayout>,
    /// The optimized pass rejected the input and the result comes from a
    /// cold rescan. Observable for logging, never an error.
    pub fell_back: bool,
}

/// Parse a station dump, using `layout` for direct indexing when known.
pub fn scan_station_dump(output: &str, layout: Option<LearnedLayout>) -> ScanOutcome {
    let lines: Vec<&str> = output.lines().collect();

    if let Some(known) = layout {
        if let Some(clients) = optimized_scan(&lines, known) {
            return ScanOutcome {
                clients,
                layout: Some(known),
                fell_back: false,
            };
        }
        let (clients, learned) = cold_scan(&lines);
        return ScanOutcome {
            clients,
            layout: learned,
            fell_back: true,
        };
    }

    let (clients, learned) = cold_scan(&lines);
    ScanOutcome {
        clients,
        layout: learned,
        fell_back: false,
    }
}

/// Linear scan of every line, pairing each station marker with the next
/// signal line in its block. Learns the layout once a second station
/// marker fixes the stride.
fn cold_scan(lines: &[&str]) -> (ClientSignalMap, Option<LearnedLayout>) {
    let mut clients = ClientSignalMap::new();
    let mut current: Option<MacAddress> = None;
    let mut first_station = None;
    let mut second_station = None;
    let mut first_signal = None;

    for (index, line) in lines.iter().enumerate() {
        if let Some(mac) = station_mac(line) {
            if let Some(unpaired) = current.take() {
                clients.entry(unpaired).or_insert(None);
            }
            if first_station.is_none() {
                first_station = Some(index);
            } else if second_station.is_none() {
                second_station = Some(index);
            }
            current = Some(mac);
        } else if let Some(signal) = signal_value(line) {
            if let Some(mac) = current.take() {
                clients.insert(mac, Some(signal));
                if second_station.is_none() && first_signal.is_none() {
                    first_signal = Some(index);
                }
            }
        }
    }
    if let Some(unpaired) = current {
        clients.entry(unpaired).or_insert(None);
    }

    // Direct indexing assumes blocks start at line zero with a uniform
    // stride; anything else stays on cold scans.
    let layout = match (first_station, second_station, first_signal) {
        (Some(0), Some(stride), Some(signal)) => Some(LearnedLayout {
            device_offset: stride,
            signal_offset: signal,
        }),
        _ => None,
    };
    (clients, layout)
}

/// Index straight into the dump at the learned positions. Returns `None`
/// as soon as any indexed line fails validation.
fn optimized_scan(lines: &[&str], layout: LearnedLayout) -> Option<ClientSignalMap> {
    if layout.device_offset == 0 || layout.signal_offset >= layout.device_offset {
        return None;
    }
    let count = lines.len() / layout.device_offset;
    let mut clients = ClientSignalMap::new();
    for i in 0..count {
        let base = i * layout.device_offset;
        let mac = station_mac(lines.get(base)?)?;
        let signal = signal_value(lines.get(base + layout.signal_offset)?)?;
        clients.insert(mac, Some(signal));
    }
    Some(clients)
}

fn station_mac(line: &str) -> Option<MacAddress> {
    let token = line.strip_prefix(STATION_MARKER)?.split_whitespace().next()?;
    // 6 colon-separated octets; anything else is not a station marker.
    if token.len() == 17 && token.bytes().filter(|b| *b == b':').count() == 5 {
        Some(MacAddress::new(token))
    } else {
        None
    }
}

/// `signal:  -54 [-58, -61] dBm` → -54. Requires a syntactically valid
/// signed integer; `signal avg:` lines do not match the marker.
fn signal_value(line: &str) -> Option<i32> {
    line.trim_start()
        .strip_prefix(SIGNAL_MARKER)?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

/// `iw dev <if> info` → channel number from the `channel` line.
pub fn parse_channel(info: &str) -> Option<u32> {
    for line in info.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("channel ") {
            return rest.split_whitespace().next()?.parse().ok();
        }
    }
    None
}

#[derive(Debug, Default)]
pub struct StationDumpBackend;

impl StationDumpBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for StationDumpBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::StationDump
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
        if !runner.run("iw --version")?.success() {
            return Err(CoreError::MissingCommand {
                tried: vec!["iw".into()],
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
        layout: Option<LearnedLayout>,
    ) -> Result<(ClientSignalMap, Option<LearnedLayout>), CoreError> {
        let dump = runner.run_checked(&format!("iw dev {interface} station dump"))?;
        let outcome = scan_station_dump(&dump, layout);
        if outcome.fell_back {
            debug!(interface, "station dump layout drifted, re-learned offsets");
        }
        Ok((outcome.clients, outcome.layout))
    }

    fn channel(
        &mut self,
        runner: &mut dyn CommandRunner,
        interface: &str,
    ) -> Result<Option<u32>, CoreError> {
        let info = runner.run_checked(&format!("iw dev {interface} info"))?;
        Ok(parse_channel(&info))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const REGULAR_DUMP: &str = "\
Station AA:BB:CC:DD:EE:FF (on wlan0)
\tinactive time:\t882 ms
\tsignal:  \t-54 [-58, -60] dBm
\ttx bitrate:\t144.4 MBit/s
Station 11:22:33:44:55:66 (on wlan0)
\tinactive time:\t12 ms
\tsignal:  \t-71 [-75, -72] dBm
\ttx bitrate:\t72.2 MBit/s
";

    fn mac(s: &str) -> MacAddress {
        MacAddress::new(s)
    }

    #[test]
    fn cold_scan_learns_offsets() {
        let outcome = scan_station_dump(REGULAR_DUMP, None);
        assert_eq!(
            outcome.layout,
            Some(LearnedLayout {
                device_offset: 4,
                signal_offset: 2
            })
        );
        assert!(!outcome.fell_back);
        assert_eq!(outcome.clients[&mac("AA:BB:CC:DD:EE:FF")], Some(-54));
        assert_eq!(outcome.clients[&mac("11:22:33:44:55:66")], Some(-71));
    }

    #[test]
    fn optimized_matches_cold_on_regular_input() {
        let cold = scan_station_dump(REGULAR_DUMP, None);
        let optimized = scan_station_dump(REGULAR_DUMP, cold.layout);
        assert!(!optimized.fell_back);
        assert_eq!(optimized.clients, cold.clients);
        assert_eq!(optimized.layout, cold.layout);
    }

    #[test]
    fn malformed_signal_triggers_fallback_not_error() {
        // Learn on a good dump, then feed one where a block grew an extra
        // line so the indexed signal token is garbage.
        let learned = scan_station_dump(REGULAR_DUMP, None).layout;
        let drifted = "\
Station AA:BB:CC:DD:EE:FF (on wlan0)
\tinactive time:\t882 ms
\trx bytes:\t123456
\tsignal:  \t-54 [-58, -60] dBm
Station 11:22:33:44:55:66 (on wlan0)
\tinactive time:\t12 ms
\trx bytes:\t654321
\tsignal:  \t-71 [-75, -72] dBm
";
        let outcome = scan_station_dump(drifted, learned);
        assert!(outcome.fell_back);
        assert_eq!(outcome.clients[&mac("AA:BB:CC:DD:EE:FF")], Some(-54));
        assert_eq!(outcome.clients[&mac("11:22:33:44:55:66")], Some(-71));
        // Re-learned against the new stride.
        assert_eq!(
            outcome.layout,
            Some(LearnedLayout {
                device_offset: 4,
                signal_offset: 3
            })
        );
    }

    #[test]
    fn unknown_station_count_follows_stride() {
        let three_blocks = format!(
            "{REGULAR_DUMP}Station 99:88:77:66:55:44 (on wlan0)\n\
             \tinactive time:\t5 ms\n\
             \tsignal:  \t-80 dBm\n\
             \ttx bitrate:\t6.5 MBit/s\n"
        );
        let layout = Some(LearnedLayout {
            device_offset: 4,
            signal_offset: 2,
        });
        let outcome = scan_station_dump(&three_blocks, layout);
        assert!(!outcome.fell_back);
        assert_eq!(outcome.clients.len(), 3);
        assert_eq!(outcome.clients[&mac("99:88:77:66:55:44")], Some(-80));
    }

    #[test]
    fn empty_dump_means_no_clients_and_keeps_layout() {
        let layout = Some(LearnedLayout {
            device_offset: 4,
            signal_offset: 2,
        });
        let outcome = scan_station_dump("", layout);
        assert!(outcome.clients.is_empty());
        assert!(!outcome.fell_back);
        assert_eq!(outcome.layout, layout);
    }

    #[test]
    fn station_without_signal_gets_null() {
        let dump = "Station AA:BB:CC:DD:EE:FF (on wlan0)\n\tinactive time:\t1 ms\n";
        let outcome = scan_station_dump(dump, None);
        assert_eq!(outcome.clients[&mac("AA:BB:CC:DD:EE:FF")], None);
        assert_eq!(outcome.layout, None);
    }

    #[test]
    fn signal_avg_lines_are_not_signal_markers() {
        let dump = "\
Station AA:BB:CC:DD:EE:FF (on wlan0)
\tsignal avg:\t-50 dBm
\tsignal:  \t-54 dBm
";
        let outcome = scan_station_dump(dump, None);
        assert_eq!(outcome.clients[&mac("AA:BB:CC:DD:EE:FF")], Some(-54));
    }

    #[test]
    fn channel_from_info_output() {
        let info = "\
Interface wlan0
\tifindex 3
\tchannel 11 (2462 MHz), width: 20 MHz, center1: 2462 MHz
";
        assert_eq!(parse_channel(info), Some(11));
        assert_eq!(parse_channel("Interface wlan0\n"), None);
    }
}
