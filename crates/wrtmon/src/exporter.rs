//! Snapshot → Prometheus text exposition.
//!
//! A fresh registry is built for every scrape and discarded afterwards,
//! so series for clients that left, interfaces that vanished, or routers
//! that degraded simply stop existing — values a device does not support
//! are never zero-filled.

use std::collections::BTreeMap;

use prometheus::{Encoder, GaugeVec, IntGaugeVec, Opts, Registry, TextEncoder};

use wrtmon_core::{MacAddress, TelemetrySnapshot};

fn gauge(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<GaugeVec, prometheus::Error> {
    let vec = GaugeVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}

fn int_gauge(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<IntGaugeVec, prometheus::Error> {
    let vec = IntGaugeVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Encode one polling pass worth of snapshots as Prometheus text format.
///
/// `client_names` substitutes friendly names into the `mac` label for
/// addresses the config maps; unmapped clients keep the raw address.
pub fn encode_snapshots(
    results: &[(String, TelemetrySnapshot)],
    client_names: &BTreeMap<MacAddress, String>,
) -> Result<String, prometheus::Error> {
    let registry = Registry::new();

    let signal = gauge(
        &registry,
        "wrtmon_client_signal_dbm",
        "Received signal strength of one associated client in dBm",
        &["router", "interface", "mac"],
    )?;
    let clients = int_gauge(
        &registry,
        "wrtmon_clients",
        "Number of associated wireless clients",
        &["router", "interface"],
    )?;
    let channel = int_gauge(
        &registry,
        "wrtmon_channel",
        "Current wireless channel",
        &["router", "interface"],
    )?;
    let rx_bytes = int_gauge(
        &registry,
        "wrtmon_rx_bytes",
        "Interface receive byte counter",
        &["router", "interface"],
    )?;
    let tx_bytes = int_gauge(
        &registry,
        "wrtmon_tx_bytes",
        "Interface transmit byte counter",
        &["router", "interface"],
    )?;
    let interface_temperature = gauge(
        &registry,
        "wrtmon_interface_temperature_celsius",
        "Wireless radio temperature",
        &["router", "interface"],
    )?;
    let load1 = gauge(&registry, "wrtmon_load1", "1-minute load average", &["router"])?;
    let load5 = gauge(&registry, "wrtmon_load5", "5-minute load average", &["router"])?;
    let load15 = gauge(
        &registry,
        "wrtmon_load15",
        "15-minute load average",
        &["router"],
    )?;
    let memory_used = gauge(
        &registry,
        "wrtmon_memory_used_percent",
        "Used memory as a percentage of total",
        &["router"],
    )?;
    let cpu_temperature = gauge(
        &registry,
        "wrtmon_cpu_temperature_celsius",
        "CPU/SoC temperature",
        &["router"],
    )?;

    for (router, snapshot) in results {
        for (interface, telemetry) in &snapshot.interfaces {
            clients
                .with_label_values(&[router, interface])
                .set(i64::try_from(telemetry.clients.len()).unwrap_or(i64::MAX));
            for (mac, value) in &telemetry.clients {
                if let Some(dbm) = value {
                    let label = client_names.get(mac).map_or(mac.as_str(), String::as_str);
                    signal
                        .with_label_values(&[router, interface, label])
                        .set(f64::from(*dbm));
                }
            }
            if let Some(value) = telemetry.channel {
                channel
                    .with_label_values(&[router, interface])
                    .set(i64::from(value));
            }
            if let Some(value) = telemetry.rx_bytes {
                rx_bytes
                    .with_label_values(&[router, interface])
                    .set(saturating_i64(value));
            }
            if let Some(value) = telemetry.tx_bytes {
                tx_bytes
                    .with_label_values(&[router, interface])
                    .set(saturating_i64(value));
            }
            if let Some(value) = telemetry.temperature_c {
                interface_temperature
                    .with_label_values(&[router, interface])
                    .set(value);
            }
        }

        if let Some(load) = snapshot.health.load {
            load1.with_label_values(&[router]).set(load.one);
            load5.with_label_values(&[router]).set(load.five);
            load15.with_label_values(&[router]).set(load.fifteen);
        }
        if let Some(value) = snapshot.health.memory_used_percent {
            memory_used.with_label_values(&[router]).set(value);
        }
        if let Some(value) = snapshot.health.cpu_temperature_c {
            cpu_temperature.with_label_values(&[router]).set(value);
        }
    }

    // Metric families nothing reported into this scrape are dropped
    // entirely rather than exposed as empty HELP/TYPE stanzas.
    let families: Vec<_> = registry
        .gather()
        .into_iter()
        .filter(|family| !family.get_metric().is_empty())
        .collect();

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
