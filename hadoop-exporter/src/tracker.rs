use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::topology::{Endpoint, ServiceTopology};

/// Per-cycle view of the scraped endpoint. Every cycle starts at `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointState {
    Unknown,
    Reachable,
    Unreachable,
    Standby,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LivenessState {
    pub reachable: bool,
    pub active: bool,
}

impl LivenessState {
    pub fn gauge(flag: bool) -> f64 {
        if flag {
            1.0
        } else {
            0.0
        }
    }
}

/// Owner of the active endpoint.
///
/// The active endpoint is only ever the self endpoint or one of the peers.
pub struct TargetTracker {
    topology: ServiceTopology,
    active: Mutex<Endpoint>,
    failure_reports: AtomicU64,
    failovers: AtomicU64,
}

impl TargetTracker {
    pub fn new(topology: ServiceTopology) -> Self {
        let active = Mutex::new(topology.self_endpoint.clone());
        Self {
            topology,
            active,
            failure_reports: AtomicU64::new(0),
            failovers: AtomicU64::new(0),
        }
    }

    pub fn topology(&self) -> &ServiceTopology {
        &self.topology
    }

    pub fn current_endpoint(&self) -> Endpoint {
        self.active.lock().clone()
    }

    /// Record that `failed` did not answer and move to the next peer after it
    /// (wrapping). Returns the endpoint to retry against, or `None` when there
    /// is no alternative. A report about a no-longer-active endpoint changes
    /// nothing and returns the current one.
    pub fn report_failure(&self, failed: &Endpoint) -> Option<Endpoint> {
        self.failure_reports.fetch_add(1, Ordering::Relaxed);
        let mut active = self.active.lock();
        if *active != *failed {
            return Some(active.clone());
        }

        let peers = &self.topology.peers;
        let next = match peers.iter().position(|p| p == failed) {
            Some(index) => (1..peers.len())
                .map(|offset| &peers[(index + offset) % peers.len()])
                .find(|p| *p != failed),
            None => peers.iter().find(|p| *p != failed),
        };
        let Some(next) = next.cloned() else {
            warn!(endpoint = %failed, "no alternate endpoint to fail over to");
            return None;
        };

        info!(from = %failed, to = %next, "failing over");
        *active = next.clone();
        self.failovers.fetch_add(1, Ordering::Relaxed);
        Some(next)
    }

    pub fn failure_reports(&self) -> u64 {
        self.failure_reports.load(Ordering::Relaxed)
    }

    pub fn failovers(&self) -> u64 {
        self.failovers.load(Ordering::Relaxed)
    }
}
