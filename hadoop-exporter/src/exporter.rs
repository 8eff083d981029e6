/*!
One scrape cycle, end to end.

The cycle runs inside the inbound `/metrics` request: ask the tracker for the
active endpoint, scrape it, fail over and retry once if it did not answer, then
turn the outcome into a `MetricSet` that always carries the liveness gauges.
Cycles are serialised so failover decisions never interleave.
*/

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::bean::RawBean;
use crate::catalog::{CatalogBody, MetricCatalog};
use crate::daemon::DaemonKind;
use crate::error::ScrapeError;
use crate::extract::{extract_applications, extract_beans, extract_role};
use crate::health::{HealthSnapshot, ScrapeHealth};
use crate::metric_set::MetricSet;
use crate::resolver::HostResolver;
use crate::scrape::Scraper;
use crate::topology::{host_part, Endpoint, ServiceTopology};
use crate::tracker::{EndpointState, LivenessState, TargetTracker};

#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Endpoint the cycle ended on (the retry target after a failover).
    pub endpoint: Endpoint,
    pub state: EndpointState,
    pub liveness: LivenessState,
    pub metrics: MetricSet,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExporterStatus {
    pub daemon: DaemonKind,
    pub group_id: String,
    pub member_id: String,
    pub identified: bool,
    pub self_endpoint: String,
    pub peers: Vec<String>,
    pub active_endpoint: String,
    pub failovers: u64,
    pub timeout_seconds: u64,
    #[serde(flatten)]
    pub health: HealthSnapshot,
}

pub struct Exporter {
    catalog: MetricCatalog,
    tracker: TargetTracker,
    scraper: Scraper,
    resolver: Arc<dyn HostResolver>,
    daemon_labels: Vec<String>,
    cycle: tokio::sync::Mutex<()>,
    health: ScrapeHealth,
}

impl Exporter {
    pub fn new(
        kind: DaemonKind,
        topology: ServiceTopology,
        resolver: Arc<dyn HostResolver>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let catalog = MetricCatalog::for_topology(kind, &topology);
        let daemon_labels = match kind {
            DaemonKind::NameNode | DaemonKind::ResourceManager => vec![
                topology.server_ip().to_string(),
                topology.group_id.clone(),
                topology.member_id.clone(),
            ],
            DaemonKind::DataNode => vec![topology.server_ip().to_string()],
            // serverip follows the endpoint actually scraped
            DaemonKind::Applications => Vec::new(),
        };
        Ok(Self {
            catalog,
            tracker: TargetTracker::new(topology),
            scraper: Scraper::new(timeout)?,
            resolver,
            daemon_labels,
            cycle: tokio::sync::Mutex::new(()),
            health: ScrapeHealth::new(),
        })
    }

    pub fn kind(&self) -> DaemonKind {
        self.catalog.kind
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    pub fn tracker(&self) -> &TargetTracker {
        &self.tracker
    }

    pub fn health(&self) -> &ScrapeHealth {
        &self.health
    }

    /// Run one full cycle. Never fails: errors end up in the report and in
    /// the liveness gauges.
    pub async fn collect(&self) -> CycleReport {
        let _cycle = self.cycle.lock().await;
        let started = Instant::now();
        let report = self.run_cycle().await;
        let elapsed = started.elapsed();
        debug!(
            endpoint = %report.endpoint,
            state = ?report.state,
            samples = report.metrics.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "scrape cycle finished"
        );
        self.health.record(&report, elapsed);
        report
    }

    /// Scrapes whatever the tracker holds. The target only moves on failure,
    /// so after a failover NameNode and ResourceManager cycles keep reading the
    /// peer under the local labels, and `isActive` stays 0 even once the local
    /// member is active again, until the peer itself fails.
    async fn run_cycle(&self) -> CycleReport {
        let kind = self.kind();
        let target = self.tracker.current_endpoint();
        let first = self
            .scraper
            .scrape(&target, kind.introspection_path(), kind.payload_shape())
            .await;

        let (endpoint, outcome) = match first {
            Err(err) if self.triggers_failover(&err) => {
                warn!(endpoint = %target, error = %err, "introspection request failed");
                match self.tracker.report_failure(&target) {
                    Some(next) if next != target => {
                        let retry = self
                            .scraper
                            .scrape(&next, kind.introspection_path(), kind.payload_shape())
                            .await;
                        (next, retry)
                    }
                    _ => (target, Err(err)),
                }
            }
            outcome => (target, outcome),
        };
        self.settle(endpoint, outcome).await
    }

    /// Redirects mean "standby" for daemons that report their role, but the
    /// applications list must come from the active RM.
    fn triggers_failover(&self, err: &ScrapeError) -> bool {
        match err {
            ScrapeError::Unreachable { .. } | ScrapeError::Status { .. } => true,
            ScrapeError::Redirect { .. } => !self.kind().reports_role(),
            ScrapeError::Decode { .. } | ScrapeError::PayloadShape(_) => false,
        }
    }

    async fn settle(&self, endpoint: Endpoint, outcome: Result<Vec<RawBean>, ScrapeError>) -> CycleReport {
        let (mut metrics, state, liveness, error) = match outcome {
            Ok(records) => {
                let (metrics, state, liveness) = self.evaluate(&records).await;
                (metrics, state, liveness, None)
            }
            Err(err) => {
                let (state, liveness) = if err.is_redirect() && self.kind().reports_role() {
                    (EndpointState::Standby, LivenessState { reachable: true, active: false })
                } else if err.endpoint_answered() && !err.is_redirect() {
                    (EndpointState::Reachable, LivenessState { reachable: true, active: false })
                } else {
                    (EndpointState::Unreachable, LivenessState::default())
                };
                warn!(endpoint = %endpoint, state = ?state, error = %err, "scrape cycle degraded");
                (MetricSet::default(), state, liveness, Some(err.to_string()))
            }
        };

        let labels = self.liveness_labels(&endpoint);
        metrics.push(&self.catalog.server_active, &labels, LivenessState::gauge(liveness.reachable));
        if let Some(is_active) = &self.catalog.is_active {
            metrics.push(is_active, &labels, LivenessState::gauge(liveness.active));
        }

        CycleReport { endpoint, state, liveness, metrics, error }
    }

    async fn evaluate(&self, records: &[RawBean]) -> (MetricSet, EndpointState, LivenessState) {
        let mut state = EndpointState::Reachable;
        let mut liveness = LivenessState { reachable: true, active: true };

        let metrics = match &self.catalog.body {
            CatalogBody::Applications(apps) => extract_applications(apps, records),
            CatalogBody::Beans(groups) => extract_beans(groups, records, &self.daemon_labels),
        };

        if let Some(source) = &self.catalog.role {
            let role = extract_role(source, records);
            match role.state.as_deref() {
                Some(reported) if !reported.eq_ignore_ascii_case("active") => {
                    state = EndpointState::Standby;
                    liveness.active = false;
                }
                Some(_) => {}
                None if source.state_key.is_some() => liveness.active = false,
                None => {}
            }
            if let Some(host) = role.host.as_deref() {
                if !self.is_local_host(host).await {
                    debug!(reported = host, "payload comes from another host, not active here");
                    liveness.active = false;
                }
            }
        }
        (metrics, state, liveness)
    }

    async fn is_local_host(&self, reported: &str) -> bool {
        let topology = self.tracker.topology();
        let host = host_part(reported).to_string();
        let own_ip = topology.server_ip().to_string();
        if host.eq_ignore_ascii_case(&topology.local_hostname) || host == own_ip {
            return true;
        }
        let resolver = Arc::clone(&self.resolver);
        match tokio::task::spawn_blocking(move || resolver.resolve(&host)).await {
            Ok(Some(ip)) => ip.to_string() == own_ip,
            _ => false,
        }
    }

    fn liveness_labels(&self, endpoint: &Endpoint) -> Vec<String> {
        match self.kind() {
            DaemonKind::Applications => vec![endpoint.host.clone(), self.tracker.topology().group_id.clone()],
            _ => self.daemon_labels.clone(),
        }
    }

    pub fn status(&self) -> ExporterStatus {
        let topology = self.tracker.topology();
        ExporterStatus {
            daemon: self.kind(),
            group_id: topology.group_id.clone(),
            member_id: topology.member_id.clone(),
            identified: topology.is_identified(),
            self_endpoint: topology.self_endpoint.url(),
            peers: topology.peers.iter().map(Endpoint::url).collect(),
            active_endpoint: self.tracker.current_endpoint().url(),
            failovers: self.tracker.failovers(),
            timeout_seconds: self.scraper.timeout().as_secs(),
            health: self.health.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StaticResolver;
    use crate::topology::Protocol;

    fn exporter(kind: DaemonKind, port: u16) -> Exporter {
        let endpoint = Endpoint::new("127.0.0.1", port, Protocol::Plaintext);
        let topology = ServiceTopology {
            self_endpoint: endpoint.clone(),
            peers: vec![endpoint],
            group_id: "ns1".into(),
            member_id: "nn1".into(),
            rpc_port: Some(8020),
            local_hostname: "nn1.corp".into(),
        };
        Exporter::new(kind, topology, Arc::new(StaticResolver::new()), Duration::from_secs(1)).unwrap()
    }

    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn unreachable_single_member_reports_liveness_down() {
        let exporter = exporter(DaemonKind::NameNode, closed_port());
        let report = exporter.collect().await;

        assert_eq!(report.state, EndpointState::Unreachable);
        assert_eq!(report.metrics.value("NameNode_ServerActive"), Some(0.0));
        assert_eq!(report.metrics.value("NameNode_isActive"), Some(0.0));
        assert_eq!(report.metrics.len(), 2);
        assert_eq!(exporter.tracker().failure_reports(), 1);
        assert_eq!(exporter.status().health.failed_scrapes_total, 1);
    }

    #[tokio::test]
    async fn role_checks_against_local_identity() {
        let exporter = exporter(DaemonKind::NameNode, closed_port());
        assert!(exporter.is_local_host("nn1.corp:8020").await);
        assert!(exporter.is_local_host("127.0.0.1:8020").await);
        assert!(!exporter.is_local_host("nn2.corp:8020").await);

        let records: Vec<RawBean> = [serde_json::json!({
            "name": "Hadoop:service=NameNode,name=NameNodeStatus",
            "State": "active",
            "HostAndPort": "nn2.corp:8020"
        })]
        .into_iter()
        .filter_map(RawBean::from_value)
        .collect();
        let (_, state, liveness) = exporter.evaluate(&records).await;
        assert_eq!(state, EndpointState::Reachable);
        assert_eq!(liveness, LivenessState { reachable: true, active: false });
    }

    #[tokio::test]
    async fn failover_policy_per_kind() {
        let redirect = ScrapeError::Redirect { url: "u".into(), status: 307, location: None };
        assert!(!exporter(DaemonKind::ResourceManager, 1).triggers_failover(&redirect));
        assert!(exporter(DaemonKind::Applications, 1).triggers_failover(&redirect));
        assert!(!exporter(DaemonKind::NameNode, 1).triggers_failover(&ScrapeError::PayloadShape("x".into())));
    }
}
