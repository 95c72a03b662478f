// ── Capability registry ──
//
// Each backend statically declares the capabilities it implements; probing
// narrows that to what the concrete device supports, once, at facade
// construction. The supported map is a plain lookup afterwards — no
// re-probing, no hidden taint flags on parser instances.

use std::collections::{BTreeMap, BTreeSet};

use strum::{Display, EnumIter};

/// Fixed vocabulary of telemetry capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum Capability {
    /// Wireless interfaces can be discovered at runtime (as opposed to a
    /// hard-coded list).
    InterfaceDetection,
    Signal,
    Channel,
    Counters,
    /// Load average and memory accounting.
    ProcStats,
    InterfaceTemperature,
    CpuTemperature,
}

/// How well a supported capability works on this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Support {
    Full,
    /// Supported with reduced accuracy (a fallback computation is used).
    Partial,
}

/// The *implemented* set (static per backend) and the *supported* map
/// (narrowed by probing). Supported is a subset of implemented by
/// construction: [`CapabilitySet::mark`] ignores capabilities the backend
/// never implemented.
#[derive(Debug, Clone)]
pub struct CapabilitySet {
    implemented: BTreeSet<Capability>,
    supported: BTreeMap<Capability, Support>,
}

impl CapabilitySet {
    pub fn new(implemented: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            implemented: implemented.into_iter().collect(),
            supported: BTreeMap::new(),
        }
    }

    pub fn implements(&self, capability: Capability) -> bool {
        self.implemented.contains(&capability)
    }

    /// Record a probe result. No-op for unimplemented capabilities.
    pub fn mark(&mut self, capability: Capability, support: Support) {
        if self.implemented.contains(&capability) {
            self.supported.insert(capability, support);
        }
    }

    /// Remove a capability the probe found missing on this device.
    pub fn unmark(&mut self, capability: Capability) {
        self.supported.remove(&capability);
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.supported.contains_key(&capability)
    }

    pub fn support(&self, capability: Capability) -> Option<Support> {
        self.supported.get(&capability).copied()
    }

    pub fn is_tainted(&self, capability: Capability) -> bool {
        self.support(capability) == Some(Support::Partial)
    }

    /// Supported capabilities in stable order, with their support level.
    pub fn iter_supported(&self) -> impl Iterator<Item = (Capability, Support)> + '_ {
        self.supported.iter().map(|(c, s)| (*c, *s))
    }

    pub fn iter_implemented(&self) -> impl Iterator<Item = Capability> + '_ {
        self.implemented.iter().copied()
    }
}
