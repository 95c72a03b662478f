// ── Generic Linux system surface ──
//
// Commands and parsers shared by every backend that runs on a
// Linux-with-shell firmware: wireless interface detection via sysfs,
// loadavg, meminfo (with the tainted fallback computation), thermal zone,
// and per-interface byte counters. Backends with restricted CLIs simply
// don't implement the corresponding capabilities.

use tracing::{debug, warn};
use wrtmon_ssh::CommandRunner;

use crate::capability::Support;
use crate::error::CoreError;
use crate::model::LoadAvg;

const MEMINFO_COMMAND: &str = "cat /proc/meminfo";
const LOADAVG_COMMAND: &str = "cat /proc/loadavg";
const THERMAL_PATH: &str = "/sys/class/thermal/thermal_zone0/temp";

// ── Interface detection ─────────────────────────────────────────────

/// List network interfaces and keep the ones exposing a wireless marker
/// in sysfs. Order follows the device's own listing.
pub fn detect_wireless_interfaces(
    runner: &mut dyn CommandRunner,
) -> Result<Vec<String>, CoreError> {
    let listing = runner.run_checked("ls /sys/class/net")?;
    let mut interfaces = Vec::new();
    for name in listing.split_whitespace() {
        let probe = runner.run(&format!("test -d /sys/class/net/{name}/wireless"))?;
        if probe.success() {
            interfaces.push(name.to_owned());
        }
    }
    debug!(?interfaces, "detected wireless interfaces");
    Ok(interfaces)
}

// ── Load average ────────────────────────────────────────────────────

pub fn load_average(runner: &mut dyn CommandRunner) -> Result<LoadAvg, CoreError> {
    let output = runner.run_checked(LOADAVG_COMMAND)?;
    parse_loadavg(&output).ok_or_else(|| CoreError::Parse {
        message: format!("unrecognized loadavg line: {:?}", output.trim()),
    })
}

pub(crate) fn parse_loadavg(text: &str) -> Option<LoadAvg> {
    let mut fields = text.split_whitespace();
    let one = fields.next()?.parse().ok()?;
    let five = fields.next()?.parse().ok()?;
    let fifteen = fields.next()?.parse().ok()?;
    Some(LoadAvg { one, five, fifteen })
}

// ── Memory accounting ───────────────────────────────────────────────

/// Decide how memory usage can be computed on this device.
///
/// `MemAvailable` present → full support. Absent (older kernels common on
/// router firmwares) → the free+buffers+cache approximation, marked
/// partial. Meminfo unreadable → the capability is dropped entirely.
pub fn probe_meminfo(runner: &mut dyn CommandRunner) -> Option<Support> {
    let output = runner.run(MEMINFO_COMMAND).ok()?;
    if !output.success() {
        return None;
    }
    if output.stdout.contains("MemAvailable:") {
        Some(Support::Full)
    } else {
        debug!("meminfo has no MemAvailable, falling back to free+buffers+cache");
        Some(Support::Partial)
    }
}

pub fn memory_used_percent(
    runner: &mut dyn CommandRunner,
    support: Support,
) -> Result<f64, CoreError> {
    let output = runner.run_checked(MEMINFO_COMMAND)?;
    compute_memory_used_percent(&output, support).ok_or_else(|| CoreError::Parse {
        message: "meminfo is missing expected fields".into(),
    })
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn compute_memory_used_percent(meminfo: &str, support: Support) -> Option<f64> {
    let total = meminfo_kb(meminfo, "MemTotal")?;
    if total == 0 {
        return None;
    }
    let unused = match support {
        Support::Full => meminfo_kb(meminfo, "MemAvailable")?,
        Support::Partial => {
            meminfo_kb(meminfo, "MemFree")?
                + meminfo_kb(meminfo, "Buffers").unwrap_or(0)
                + meminfo_kb(meminfo, "Cached").unwrap_or(0)
        }
    };
    Some((total.saturating_sub(unused) as f64) / (total as f64) * 100.0)
}

fn meminfo_kb(meminfo: &str, field: &str) -> Option<u64> {
    for line in meminfo.lines() {
        if let Some(rest) = line.strip_prefix(field) {
            if let Some(value) = rest.strip_prefix(':') {
                return value.split_whitespace().next()?.parse().ok();
            }
        }
    }
    None
}

// ── CPU temperature ─────────────────────────────────────────────────

/// Presence probe for the thermal zone; absence removes the capability
/// rather than failing.
pub fn probe_cpu_temperature(runner: &mut dyn CommandRunner) -> bool {
    runner
        .run(&format!("test -r {THERMAL_PATH}"))
        .is_ok_and(|o| o.success())
}

pub fn cpu_temperature(runner: &mut dyn CommandRunner) -> Result<f64, CoreError> {
    let output = runner.run_checked(&format!("cat {THERMAL_PATH}"))?;
    parse_millidegrees(&output).ok_or_else(|| CoreError::Parse {
        message: format!("unrecognized thermal value: {:?}", output.trim()),
    })
}

pub(crate) fn parse_millidegrees(text: &str) -> Option<f64> {
    let raw: f64 = text.trim().parse().ok()?;
    Some(raw / 1000.0)
}

// ── Byte counters ───────────────────────────────────────────────────

/// Read rx/tx byte counters for one interface. A failure on either side
/// yields `None` for that side only.
pub fn interface_counters(
    runner: &mut dyn CommandRunner,
    interface: &str,
) -> Result<(Option<u64>, Option<u64>), CoreError> {
    let rx = read_counter(runner, interface, "rx_bytes")?;
    let tx = read_counter(runner, interface, "tx_bytes")?;
    Ok((rx, tx))
}

fn read_counter(
    runner: &mut dyn CommandRunner,
    interface: &str,
    which: &str,
) -> Result<Option<u64>, CoreError> {
    let command = format!("cat /sys/class/net/{interface}/statistics/{which}");
    let output = runner.run(&command)?;
    if !output.success() {
        warn!(interface, which, "counter read failed");
        return Ok(None);
    }
    Ok(output.trimmed().parse().ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MEMINFO_NEW: &str = "MemTotal:         255840 kB\n\
                               MemFree:           73344 kB\n\
                               MemAvailable:     127920 kB\n\
                               Buffers:           10240 kB\n\
                               Cached:            30720 kB\n";

    const MEMINFO_OLD: &str = "MemTotal:         255840 kB\n\
                               MemFree:           73344 kB\n\
                               Buffers:           10240 kB\n\
                               Cached:            30720 kB\n";

    #[test]
    fn loadavg_parses_first_three_fields() {
        let load = parse_loadavg("0.52 0.41 0.30 2/63 1204\n").unwrap();
        assert_eq!(
            load,
            LoadAvg {
                one: 0.52,
                five: 0.41,
                fifteen: 0.30
            }
        );
    }

    #[test]
    fn loadavg_rejects_garbage() {
        assert_eq!(parse_loadavg("not a loadavg"), None);
    }

    #[test]
    fn memory_full_uses_mem_available() {
        let pct = compute_memory_used_percent(MEMINFO_NEW, Support::Full).unwrap();
        assert!((pct - 50.0).abs() < 0.01, "got {pct}");
    }

    #[test]
    fn memory_partial_approximates_from_free_buffers_cache() {
        let pct = compute_memory_used_percent(MEMINFO_OLD, Support::Partial).unwrap();
        // used = 255840 - (73344 + 10240 + 30720) = 141536
        assert!((pct - 55.32).abs() < 0.01, "got {pct}");
    }

    #[test]
    fn memory_full_requires_mem_available() {
        assert_eq!(compute_memory_used_percent(MEMINFO_OLD, Support::Full), None);
    }

    #[test]
    fn millidegrees_scaled_to_celsius() {
        assert_eq!(parse_millidegrees("48750\n"), Some(48.75));
        assert_eq!(parse_millidegrees("garbage"), None);
    }
}
