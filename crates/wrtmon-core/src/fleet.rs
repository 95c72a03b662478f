// ── Fleet ──
//
// The set of routers one collector instance polls. Construction filters:
// a router that cannot be reached or fails probing is logged and left out
// for the whole run rather than poisoning every scrape.

use tracing::{info, warn};

use crate::model::{RouterIdentity, TelemetrySnapshot};
use crate::router::Router;

#[derive(Default)]
pub struct Fleet {
    routers: Vec<Router>,
}

impl Fleet {
    /// Connect and probe every configured router sequentially. Failures
    /// exclude that router only; the rest of the fleet is unaffected.
    pub fn connect(identities: &[RouterIdentity]) -> Self {
        let mut routers = Vec::with_capacity(identities.len());
        for identity in identities {
            match Router::connect(identity) {
                Ok(router) => routers.push(router),
                Err(e) => {
                    warn!(router = %identity.name, error = %e, "excluding router from this run");
                }
            }
        }
        info!(
            connected = routers.len(),
            configured = identities.len(),
            "fleet ready"
        );
        Self { routers }
    }

    /// Assemble a fleet from already-probed routers.
    pub fn new(routers: Vec<Router>) -> Self {
        Self { routers }
    }

    pub fn routers(&self) -> &[Router] {
        &self.routers
    }

    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.routers.len()
    }

    /// One full polling pass. Routers are polled one after another over
    /// their private sessions; a degraded router is simply absent from the
    /// result.
    pub fn poll(&mut self) -> Vec<(String, TelemetrySnapshot)> {
        self.routers
            .iter_mut()
            .filter_map(|router| {
                router
                    .update()
                    .map(|snapshot| (router.name().to_owned(), snapshot))
            })
            .collect()
    }
}
