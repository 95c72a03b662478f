// ── Domain types ──
//
// The normalized telemetry vocabulary shared by the backends, the facade,
// and the exporter. Snapshots are built fresh on every poll and never
// merged with the previous one; a field that a device does not support is
// simply `None`, never zero.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;

// ── MacAddress ──────────────────────────────────────────────────────

/// Client hardware address, normalized to uppercase colon-separated hex
/// (`AA:BB:CC:DD:EE:FF`) — the form `wl` and `iw` print.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MacAddress(String);

impl MacAddress {
    /// Create a normalized MAC address from any common format.
    /// Accepts colon-separated, dash-separated, upper or lower case.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let normalized = raw.as_ref().trim().to_uppercase().replace('-', ":");
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MacAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

// ── Router identity ─────────────────────────────────────────────────

/// Everything needed to reach and interpret one router. Immutable after
/// construction; built from configuration by the binary.
#[derive(Debug, Clone)]
pub struct RouterIdentity {
    /// Unique key; becomes the `router` metric label.
    pub name: String,
    pub host: String,
    pub port: u16,
    pub backend: BackendKind,
    pub username: String,
    pub password: Option<SecretString>,
    /// Authenticate through the local SSH agent instead of a password.
    pub use_keys: bool,
    pub connect_timeout: Duration,
}

impl RouterIdentity {
    pub fn session_config(&self) -> wrtmon_ssh::SessionConfig {
        wrtmon_ssh::SessionConfig {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            use_keys: self.use_keys,
            connect_timeout: self.connect_timeout,
        }
    }
}

// ── Telemetry ───────────────────────────────────────────────────────

/// Per-interface client → signal strength (dBm) map, rebuilt fully on
/// every poll. `None` means the client was seen but its signal could not
/// be read this cycle. Duplicate client reports overwrite.
pub type ClientSignalMap = BTreeMap<MacAddress, Option<i32>>;

/// 1/5/15-minute load average triple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadAvg {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

/// System-level health values. Each field is gated by its own capability.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemHealth {
    pub load: Option<LoadAvg>,
    pub memory_used_percent: Option<f64>,
    pub cpu_temperature_c: Option<f64>,
}

/// Telemetry extracted for one wireless interface in one poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterfaceTelemetry {
    pub clients: ClientSignalMap,
    pub channel: Option<u32>,
    pub rx_bytes: Option<u64>,
    pub tx_bytes: Option<u64>,
    pub temperature_c: Option<f64>,
}

/// Per-router aggregate handed to the exporter, constructed fresh each
/// poll and discarded after being read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    /// Keyed by interface name, in stable order.
    pub interfaces: BTreeMap<String, InterfaceTelemetry>,
    pub health: SystemHealth,
}

// ── Adaptive parser layout ──────────────────────────────────────────

/// Learned line offsets for the station-dump parser.
///
/// `device_offset` is the line stride between consecutive station blocks;
/// `signal_offset` is the distance from a station marker to its signal
/// line. Owned by the facade (one per interface) and passed into the
/// parser; a failed validation returns `None`, forcing a re-learn on the
/// next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearnedLayout {
    pub device_offset: usize,
    pub signal_offset: usize,
}
