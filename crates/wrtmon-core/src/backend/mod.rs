// ── Backend parser strategies ──
//
// One implementation per firmware family. A backend turns raw command
// output into structured per-interface results; it never owns the session
// and never decides retry policy — that is the facade's job. Selection is
// a plain match on the configured kind, no inheritance chains.

pub mod fixed_report;
pub mod station_dump;
pub mod structured;
pub mod token_list;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::capability::{Capability, CapabilitySet};
use crate::error::CoreError;
use crate::model::{ClientSignalMap, LearnedLayout};
use wrtmon_ssh::CommandRunner;

/// Closed enumeration of firmware families, keyed by the identifier used
/// in the routers config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum BackendKind {
    /// Broadcom/Atheros DD-WRT: `wl assoclist` token list plus per-client
    /// `wl rssi` queries.
    #[serde(rename = "wl")]
    #[strum(serialize = "wl")]
    TokenList,
    /// Generic Linux wireless stack: `iw dev <if> station dump` blocks
    /// with adaptive offset learning.
    #[serde(rename = "iw")]
    #[strum(serialize = "iw")]
    StationDump,
    /// ASUS DSL-AC55U: one fixed-layout `ATE show_stainfo` report
    /// covering both bands.
    #[serde(rename = "ate")]
    #[strum(serialize = "ate")]
    FixedReport,
    /// OpenWrt: machine-readable station list via `ubus`/iwinfo.
    #[serde(rename = "ubus")]
    #[strum(serialize = "ubus")]
    StructuredReport,
}

impl BackendKind {
    /// Construct the parser strategy for this firmware family.
    pub fn build(self) -> Box<dyn Backend + Send> {
        match self {
            Self::TokenList => Box::new(token_list::TokenListBackend::new()),
            Self::StationDump => Box::new(station_dump::StationDumpBackend::new()),
            Self::FixedReport => Box::new(fixed_report::FixedReportBackend::new()),
            Self::StructuredReport => Box::new(structured::StructuredBackend::new()),
        }
    }
}

/// A firmware-family parser strategy.
///
/// Methods take the runner by `&mut dyn` so one facade can drive any
/// backend over its single session. Extraction methods are only invoked
/// for capabilities the probe confirmed, so implementations may assume
/// their commands exist.
pub trait Backend {
    fn kind(&self) -> BackendKind;

    /// Capabilities this backend's code supports in principle.
    fn implemented(&self) -> BTreeSet<Capability>;

    /// One-time probing at facade construction: command availability
    /// checks and capability narrowing. A `MissingCommand` error here is
    /// fatal to this router for the whole run.
    fn probe(&mut self, runner: &mut dyn CommandRunner) -> Result<CapabilitySet, CoreError>;

    /// Hard-coded interface list for firmwares whose interfaces are not
    /// discoverable. `None` means runtime detection applies.
    fn fixed_interfaces(&self) -> Option<Vec<String>> {
        None
    }

    /// Per-poll setup hook. Backends whose telemetry comes from one
    /// combined report fetch it here, once, and reuse it across the
    /// extraction calls of this poll.
    fn begin_poll(&mut self, _runner: &mut dyn CommandRunner) -> Result<(), CoreError> {
        Ok(())
    }

    /// Extract the client → signal map for one interface.
    ///
    /// `layout` carries the previously learned station-dump offsets where
    /// the backend uses them; the returned layout replaces it (possibly
    /// `None` after a validation failure, forcing a re-learn next poll).
    fn signal_map(
        &mut self,
        runner: &mut dyn CommandRunner,
        interface: &str,
        layout: Option<LearnedLayout>,
    ) -> Result<(ClientSignalMap, Option<LearnedLayout>), CoreError>;

    /// Current channel for one interface.
    fn channel(
        &mut self,
        runner: &mut dyn CommandRunner,
        interface: &str,
    ) -> Result<Option<u32>, CoreError>;

    /// Radio temperature for one interface, where the firmware exposes
    /// one.
    fn interface_temperature(
        &mut self,
        _runner: &mut dyn CommandRunner,
        _interface: &str,
    ) -> Result<Option<f64>, CoreError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_identifiers_round_trip() {
        for (kind, id) in [
            (BackendKind::TokenList, "wl"),
            (BackendKind::StationDump, "iw"),
            (BackendKind::FixedReport, "ate"),
            (BackendKind::StructuredReport, "ubus"),
        ] {
            assert_eq!(kind.to_string(), id);
            assert_eq!(id.parse::<BackendKind>().ok(), Some(kind));
        }
    }

    #[test]
    fn every_backend_declares_signal() {
        for kind in [
            BackendKind::TokenList,
            BackendKind::StationDump,
            BackendKind::FixedReport,
            BackendKind::StructuredReport,
        ] {
            let backend = kind.build();
            assert!(backend.implemented().contains(&Capability::Signal));
            assert_eq!(backend.kind(), kind);
        }
    }
}
