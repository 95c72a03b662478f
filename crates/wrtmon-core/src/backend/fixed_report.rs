// ── Fixed-report backend (DSL-AC55U `ATE show_stainfo`) ──
//
// One combined diagnostic dump covers both radios. The layout is fixed by
// the firmware: a 40-dash rule at line 6 opens the 2.4 GHz device table
// (skipping one header line), any later rule opens the 5 GHz table; the
// 2.4 GHz table ends at the first blank-line pair and the 5 GHz table at
// end-of-output. The report is fetched once per poll and shared by the
// signal and channel extractors.

use std::collections::BTreeSet;

use tracing::warn;
use wrtmon_ssh::CommandRunner;

use crate::backend::{Backend, BackendKind};
use crate::capability::{Capability, CapabilitySet, Support};
use crate::error::CoreError;
use crate::model::{ClientSignalMap, LearnedLayout, MacAddress};

const REPORT_COMMAND: &str = "ATE show_stainfo";
const RULE: &str = "----------------------------------------";

/// The two frequency bands the report covers, exposed as pseudo
/// interfaces `2g` and `5g`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Low,
    High,
}

impl Band {
    fn sentinel(self) -> &'static str {
        match self {
            Self::Low => "2.4 GHz radio is disabled",
            Self::High => "5 GHz radio is disabled",
        }
    }

    fn interface(self) -> &'static str {
        match self {
            Self::Low => "2g",
            Self::High => "5g",
        }
    }

    fn from_interface(interface: &str) -> Option<Self> {
        match interface {
            "2g" => Some(Self::Low),
            "5g" => Some(Self::High),
            _ => None,
        }
    }
}

/// Extract the device table of one band from the combined report.
pub fn parse_band_signals(report: &str, band: Band) -> ClientSignalMap {
    let lines: Vec<&str> = report.trim().lines().collect();
    let mut clients = ClientSignalMap::new();

    if lines.iter().any(|l| *l == band.sentinel()) {
        return clients;
    }

    let mut start = 0;
    let mut end = 0;
    for (index, line) in lines.iter().enumerate() {
        if *line == RULE {
            if band == Band::Low && index == 6 {
                start = index + 2;
            } else if band == Band::High && index > 6 {
                start = index + 2;
            }
        } else if band == Band::Low
            && line.is_empty()
            && lines.get(index + 1).is_some_and(|next| next.is_empty())
        {
            end = index.saturating_sub(1);
            break;
        } else if band == Band::High && index + 1 == lines.len() {
            end = index;
        }
    }
    if start == 0 || end < start {
        return clients;
    }

    for line in &lines[start..=end] {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some(mac), Some(signal)) => {
                let value = signal.trim_end_matches("dBm").parse().ok();
                clients.insert(MacAddress::new(mac), value);
            }
            _ if line.trim().is_empty() => {}
            _ => warn!(row = *line, "skipping malformed device-table row"),
        }
    }
    clients
}

/// Channel lines appear once per enabled band; the first belongs to the
/// 2.4 GHz radio, the last to the 5 GHz radio.
pub fn parse_band_channel(report: &str, band: Band) -> Option<u32> {
    let lines: Vec<&str> = report.trim().lines().collect();
    if lines.iter().any(|l| *l == band.sentinel()) {
        return None;
    }

    let channels: Vec<u32> = lines
        .iter()
        .filter(|l| l.contains("Channel"))
        .filter_map(|l| first_integer(l))
        .collect();
    match band {
        Band::Low => channels.first().copied(),
        Band::High => channels.last().copied(),
    }
}

fn first_integer(line: &str) -> Option<u32> {
    let digits: String = line
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

#[derive(Debug, Default)]
pub struct FixedReportBackend {
    /// Combined report for the current poll, shared across extraction
    /// calls. Refreshed by `begin_poll`.
    report: Option<String>,
}

impl FixedReportBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn report(&self) -> &str {
        self.report.as_deref().unwrap_or("")
    }

    fn band(interface: &str) -> Result<Band, CoreError> {
        Band::from_interface(interface).ok_or_else(|| CoreError::Parse {
            message: format!("unknown band interface {interface:?}"),
        })
    }
}

impl Backend for FixedReportBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::FixedReport
    }

    fn implemented(&self) -> BTreeSet<Capability> {
        [Capability::Signal, Capability::Channel].into()
    }

    fn probe(&mut self, runner: &mut dyn CommandRunner) -> Result<CapabilitySet, CoreError> {
        if !runner.run(REPORT_COMMAND)?.success() {
            return Err(CoreError::MissingCommand {
                tried: vec![REPORT_COMMAND.into()],
            });
        }
        let mut capabilities = CapabilitySet::new(self.implemented());
        capabilities.mark(Capability::Signal, Support::Full);
        capabilities.mark(Capability::Channel, Support::Full);
        Ok(capabilities)
    }

    fn fixed_interfaces(&self) -> Option<Vec<String>> {
        Some(vec![
            Band::Low.interface().to_owned(),
            Band::High.interface().to_owned(),
        ])
    }

    fn begin_poll(&mut self, runner: &mut dyn CommandRunner) -> Result<(), CoreError> {
        let output = runner.run(REPORT_COMMAND)?;
        if output.success() {
            self.report = Some(output.stdout);
        } else {
            warn!(status = output.status, "stainfo report unavailable this poll");
            self.report = None;
        }
        Ok(())
    }

    fn signal_map(
        &mut self,
        _runner: &mut dyn CommandRunner,
        interface: &str,
        _layout: Option<LearnedLayout>,
    ) -> Result<(ClientSignalMap, Option<LearnedLayout>), CoreError> {
        let band = Self::band(interface)?;
        Ok((parse_band_signals(self.report(), band), None))
    }

    fn channel(
        &mut self,
        _runner: &mut dyn CommandRunner,
        interface: &str,
    ) -> Result<Option<u32>, CoreError> {
        let band = Self::band(interface)?;
        Ok(parse_band_channel(self.report(), band))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::FakeRunner;
    use pretty_assertions::assert_eq;

    // Trimmed to the shape the firmware actually emits: headers, a rule
    // at line 6, the 2.4 GHz table, a blank-line pair, then the 5 GHz
    // section with its own rule.
    const REPORT: &str = "\
ASUSTeK DSL-AC55U
Firmware : 1.1.2.3
Channel : 6
----- 2.4 GHz -----
AP MAC : 00:11:22:33:44:55
Stations : 2
----------------------------------------
MAC               RSSI   CONNECTED
AA:BB:CC:DD:EE:FF -45dBm 00:12:33
11:22:33:44:55:66 -67dBm 01:00:05


----- 5 GHz -----
Channel : 36
----------------------------------------
MAC               RSSI   CONNECTED
99:88:77:66:55:44 -52dBm 00:03:10
";

    fn mac(s: &str) -> MacAddress {
        MacAddress::new(s)
    }

    #[test]
    fn low_band_table_between_rule_and_blank_pair() {
        let clients = parse_band_signals(REPORT, Band::Low);
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[&mac("AA:BB:CC:DD:EE:FF")], Some(-45));
        assert_eq!(clients[&mac("11:22:33:44:55:66")], Some(-67));
    }

    #[test]
    fn high_band_table_runs_to_end_of_output() {
        let clients = parse_band_signals(REPORT, Band::High);
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[&mac("99:88:77:66:55:44")], Some(-52));
    }

    #[test]
    fn disabled_band_short_circuits_to_empty() {
        let report = "header\n2.4 GHz radio is disabled\nmore\n";
        assert!(parse_band_signals(report, Band::Low).is_empty());
        assert_eq!(parse_band_channel(report, Band::Low), None);
    }

    #[test]
    fn channel_lines_first_is_low_last_is_high() {
        assert_eq!(parse_band_channel(REPORT, Band::Low), Some(6));
        assert_eq!(parse_band_channel(REPORT, Band::High), Some(36));
    }

    #[test]
    fn malformed_rows_are_skipped_not_fatal() {
        let report = "\
x
x
x
x
x
x
----------------------------------------
MAC               RSSI
AA:BB:CC:DD:EE:FF -45dBm
lonelytoken


";
        let clients = parse_band_signals(report, Band::Low);
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[&mac("AA:BB:CC:DD:EE:FF")], Some(-45));
    }

    #[test]
    fn report_without_rules_yields_empty() {
        assert!(parse_band_signals("just noise\nno tables\n", Band::Low).is_empty());
    }

    #[test]
    fn report_is_fetched_once_per_poll() {
        let mut runner = FakeRunner::new().on(REPORT_COMMAND, 0, REPORT);
        let mut backend = FixedReportBackend::new();

        backend.begin_poll(&mut runner).unwrap();
        for interface in ["2g", "5g"] {
            backend.signal_map(&mut runner, interface, None).unwrap();
            backend.channel(&mut runner, interface).unwrap();
        }
        assert_eq!(runner.call_count(REPORT_COMMAND), 1);
    }

    #[test]
    fn failed_report_fetch_degrades_to_empty_maps() {
        let mut runner = FakeRunner::new().on(REPORT_COMMAND, 1, "");
        let mut backend = FixedReportBackend::new();

        backend.begin_poll(&mut runner).unwrap();
        let (clients, _) = backend.signal_map(&mut runner, "2g", None).unwrap();
        assert!(clients.is_empty());
    }
}
