use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::exporter::CycleReport;
use crate::tracker::EndpointState;

#[derive(Debug, Clone, Serialize)]
pub struct LastCycle {
    pub finished_at: String, // RFC3339
    pub endpoint: String,
    pub state: EndpointState,
    pub reachable: bool,
    pub active: bool,
    pub samples: usize,
    pub duration_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub uptime_seconds: u64,
    pub scrapes_total: u64,
    pub failed_scrapes_total: u64,
    pub last_cycle: Option<LastCycle>,
}

/// Process-level counters behind `/status`.
#[derive(Clone)]
pub struct ScrapeHealth {
    start_time: Instant,
    scrapes: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    last: Arc<parking_lot::Mutex<Option<LastCycle>>>,
}

impl Default for ScrapeHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrapeHealth {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            scrapes: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicU64::new(0)),
            last: Arc::new(parking_lot::Mutex::new(None)),
        }
    }

    pub fn record(&self, report: &CycleReport, elapsed: Duration) {
        self.scrapes.fetch_add(1, Ordering::Relaxed);
        if report.error.is_some() {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        *self.last.lock() = Some(LastCycle {
            finished_at: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
            endpoint: report.endpoint.url(),
            state: report.state,
            reachable: report.liveness.reachable,
            active: report.liveness.active,
            samples: report.metrics.len(),
            duration_ms: elapsed.as_millis().try_into().unwrap_or(u64::MAX),
            error: report.error.clone(),
        });
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            scrapes_total: self.scrapes.load(Ordering::Relaxed),
            failed_scrapes_total: self.failed.load(Ordering::Relaxed),
            last_cycle: self.last.lock().clone(),
        }
    }
}
