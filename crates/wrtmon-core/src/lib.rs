//! Telemetry acquisition layer between `wrtmon-ssh` and the metrics
//! exporter.
//!
//! This crate owns the part of wrtmon that has to survive contact with
//! real router firmwares:
//!
//! - **[`Router`]** — Per-router polling facade. Construction connects the
//!   session and runs capability probing exactly once; afterwards each
//!   [`update()`](Router::update) call produces a fresh
//!   [`TelemetrySnapshot`] (or nothing at all for a degraded cycle).
//!
//! - **[`Backend`]** ([`backend`]) — One parser strategy per firmware
//!   family, selected by [`BackendKind`] at construction: whitespace
//!   token lists (`wl`/`wl_atheros`), adaptive station-dump scanning
//!   (`iw`), a fixed-layout diagnostic report (`ATE show_stainfo`), and a
//!   JSON station list (`ubus`/iwinfo).
//!
//! - **[`CapabilitySet`]** ([`capability`]) — What a backend could do in
//!   principle, narrowed at probe time to what the device in front of us
//!   actually supports, with a `Partial` marker for fallback computations.
//!
//! - **[`Fleet`]** — The sequence of routers a scrape iterates over.
//!   Routers whose probing fails are excluded up front; routers that fail
//!   mid-run degrade for one cycle without touching their neighbours.
//!
//! Everything here is synchronous. Polling is pull-driven by the external
//! scrape, one router after another, one command at a time.

pub mod backend;
pub mod capability;
pub mod error;
pub mod fleet;
pub mod model;
pub mod router;
pub mod system;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{Backend, BackendKind};
pub use capability::{Capability, CapabilitySet, Support};
pub use error::CoreError;
pub use fleet::Fleet;
pub use model::{
    ClientSignalMap, InterfaceTelemetry, LearnedLayout, LoadAvg, MacAddress, RouterIdentity,
    SystemHealth, TelemetrySnapshot,
};
pub use router::{Router, RouterState};
