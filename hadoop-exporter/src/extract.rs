use tracing::debug;

use crate::bean::RawBean;
use crate::catalog::{AppCatalog, BeanGroup, RoleSource};
use crate::metric_set::MetricSet;

/// What the daemon says about itself in its payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleReport {
    pub state: Option<String>,
    pub host: Option<String>,
}

/// Pull the catalog's counters out of a JMX bean list.
///
/// A group whose bean is absent contributes nothing; a matched bean missing a
/// field loses only that one metric.
pub fn extract_beans<S: AsRef<str>>(groups: &[BeanGroup], beans: &[RawBean], labels: &[S]) -> MetricSet {
    let mut set = MetricSet::default();
    for group in groups {
        let Some(bean) = beans.iter().find(|b| b.name().is_some_and(|n| group.matcher.matches(n))) else {
            debug!(bean = ?group.matcher, "bean not present in payload");
            continue;
        };
        for metric in &group.metrics {
            match metric.field.read(bean) {
                Some(value) => set.push(metric, labels, value),
                None => debug!(metric = %metric.name, field = ?metric.field, "field missing, metric skipped"),
            }
        }
    }
    set
}

pub fn extract_role(source: &RoleSource, beans: &[RawBean]) -> RoleReport {
    let Some(bean) = beans.iter().find(|b| b.name().is_some_and(|n| source.matcher.matches(n))) else {
        return RoleReport::default();
    };
    RoleReport {
        state: source.state_key.and_then(|k| bean.text(k)).map(str::to_string),
        host: bean.text(source.host_key).map(str::to_string),
    }
}

/// Lifecycle gauge value: RUNNING 1, KILLED 3, SUCCEEDED 0, FAILED 2, else -1.
pub fn lifecycle_state(state: Option<&str>, final_status: Option<&str>) -> f64 {
    let either = |wanted: &str| state == Some(wanted) || final_status == Some(wanted);
    if state == Some("RUNNING") {
        1.0
    } else if either("KILLED") {
        3.0
    } else if either("SUCCEEDED") {
        0.0
    } else if either("FAILED") {
        2.0
    } else {
        -1.0
    }
}

/// Container id from `amContainerLogs`: the 6th `/`-separated segment of
/// `http://<nm-host>:<port>/node/containerlogs/<container>/<user>`.
pub fn am_container(logs: Option<&str>) -> &str {
    logs.and_then(|l| l.split('/').nth(5)).unwrap_or("")
}

/// One labelled series per application record.
pub fn extract_applications(catalog: &AppCatalog, records: &[RawBean]) -> MetricSet {
    let mut set = MetricSet::default();
    for app in records {
        let state = app.text("state");
        let labels = [
            app.text("id").unwrap_or(""),
            am_container(app.text("amContainerLogs")),
            app.text("applicationType").unwrap_or(""),
            app.text("name").unwrap_or(""),
            app.text("user").unwrap_or(""),
        ];

        set.push(&catalog.state, &labels, lifecycle_state(state, app.text("finalStatus")));

        let running = state == Some("RUNNING");
        let metrics = catalog
            .always
            .iter()
            .chain(catalog.running_only.iter().filter(|_| running));
        for metric in metrics {
            match metric.field.read(app) {
                Some(value) => set.push(metric, &labels, value),
                None => debug!(app = labels[0], metric = %metric.name, "field missing, metric skipped"),
            }
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogBody, MetricCatalog};
    use crate::daemon::DaemonKind;
    use crate::topology::{Endpoint, Protocol, ServiceTopology};
    use serde_json::json;

    fn catalog(kind: DaemonKind) -> MetricCatalog {
        let endpoint = Endpoint::new("10.0.0.1", 9870, Protocol::Plaintext);
        let topology = ServiceTopology {
            self_endpoint: endpoint.clone(),
            peers: vec![endpoint],
            group_id: "ns1".into(),
            member_id: "nn1".into(),
            rpc_port: Some(8020),
            local_hostname: "nn1".into(),
        };
        MetricCatalog::for_topology(kind, &topology)
    }

    fn beans(value: serde_json::Value) -> Vec<RawBean> {
        value
            .as_array()
            .unwrap()
            .iter()
            .cloned()
            .filter_map(RawBean::from_value)
            .collect()
    }

    fn groups(catalog: &MetricCatalog) -> &[BeanGroup] {
        match &catalog.body {
            CatalogBody::Beans(groups) => groups,
            CatalogBody::Applications(_) => panic!("bean catalog expected"),
        }
    }

    #[test]
    fn missing_field_skips_only_that_metric() {
        let catalog = catalog(DaemonKind::NameNode);
        let payload = beans(json!([
            {"name": "Hadoop:service=NameNode,name=FSNamesystem", "MissingBlocks": 0.0, "CapacityTotal": 1000.0, "CapacityUsed": "n/a"}
        ]));
        let set = extract_beans(groups(&catalog), &payload, &["10.0.0.1", "ns1", "nn1"]);

        assert_eq!(set.value("NameNode_MissingBlocks"), Some(0.0));
        assert_eq!(set.value("NameNode_CapacityTotal"), Some(1000.0));
        assert_eq!(set.value("NameNode_CapacityUsed"), None);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn extraction_is_idempotent() {
        let catalog = catalog(DaemonKind::NameNode);
        let payload = beans(json!([
            {"name": "java.lang:type=Memory", "HeapMemoryUsage": {"committed": 1, "init": 2, "max": 3, "used": 4}},
            {"name": "Hadoop:service=NameNode,name=RpcActivityForPort8020", "RpcQueueTimeNumOps": 12}
        ]));
        let labels = ["10.0.0.1", "ns1", "nn1"];
        let first = extract_beans(groups(&catalog), &payload, &labels);
        let second = extract_beans(groups(&catalog), &payload, &labels);

        assert_eq!(first, second);
        assert_eq!(first.value("NameNode_heapMemoryUsageUsed"), Some(4.0));
        assert_eq!(first.value("NameNode_RpcQueueTimeNumOps"), Some(12.0));
    }

    #[test]
    fn datanode_activity_matches_by_prefix() {
        let catalog = catalog(DaemonKind::DataNode);
        let payload = beans(json!([
            {"name": "Hadoop:service=DataNode,name=DataNodeActivity-worker7-9866", "VolumeFailures": 2, "DatanodeNetworkErrors": 5},
            {"name": "Hadoop:service=DataNode,name=FSDatasetState", "Capacity": 10, "DfsUsed": 3, "Remaining": 7}
        ]));
        let set = extract_beans(groups(&catalog), &payload, &["10.0.0.7"]);

        assert_eq!(set.value("DataNode_VolumeFailures"), Some(2.0));
        assert_eq!(set.value("DataNode_CapacityUsed"), Some(3.0));
        assert_eq!(set.samples()[0].label("serverip"), Some("10.0.0.7"));
    }

    #[test]
    fn garbage_never_panics() {
        let catalog = catalog(DaemonKind::ResourceManager);
        let payload = beans(json!([
            {"name": 7},
            {"name": "Hadoop:service=ResourceManager,name=ClusterMetrics", "NumActiveNMs": null, "tag.Hostname": 3},
            {}
        ]));
        let set = extract_beans(groups(&catalog), &payload, &["a", "b", "c"]);
        assert!(set.is_empty());

        let role = extract_role(catalog.role.as_ref().unwrap(), &payload);
        assert_eq!(role, RoleReport::default());
    }

    #[test]
    fn reads_namenode_role() {
        let catalog = catalog(DaemonKind::NameNode);
        let payload = beans(json!([
            {"name": "Hadoop:service=NameNode,name=NameNodeStatus", "State": "standby", "HostAndPort": "nn2.corp:8020"}
        ]));
        let role = extract_role(catalog.role.as_ref().unwrap(), &payload);
        assert_eq!(role.state.as_deref(), Some("standby"));
        assert_eq!(role.host.as_deref(), Some("nn2.corp:8020"));
    }

    #[test]
    fn lifecycle_precedence() {
        assert_eq!(lifecycle_state(Some("RUNNING"), Some("UNDEFINED")), 1.0);
        assert_eq!(lifecycle_state(Some("FINISHED"), Some("KILLED")), 3.0);
        assert_eq!(lifecycle_state(Some("KILLED"), Some("KILLED")), 3.0);
        assert_eq!(lifecycle_state(Some("FINISHED"), Some("SUCCEEDED")), 0.0);
        assert_eq!(lifecycle_state(Some("FAILED"), Some("FAILED")), 2.0);
        assert_eq!(lifecycle_state(Some("FINISHED"), None), -1.0);
        assert_eq!(lifecycle_state(None, None), -1.0);
    }

    #[test]
    fn am_container_segment() {
        assert_eq!(
            am_container(Some("http://nm3.corp:8042/node/containerlogs/container_1_0001_01_000001/hive")),
            "container_1_0001_01_000001"
        );
        assert_eq!(am_container(Some("http://short")), "");
        assert_eq!(am_container(None), "");
    }

    #[test]
    fn running_only_metrics_follow_state() {
        let catalog = catalog(DaemonKind::Applications);
        let CatalogBody::Applications(apps) = &catalog.body else { panic!("application catalog expected") };
        let records = beans(json!([
            {"id": "application_1_0001", "state": "RUNNING", "finalStatus": "UNDEFINED", "user": "hive",
             "name": "q1", "applicationType": "TEZ", "elapsedTime": 10, "allocatedMB": 2048, "allocatedVCores": 2,
             "reservedMB": 0, "reservedVCores": 0, "runningContainers": 3, "queueUsagePercentage": 1.5,
             "clusterUsagePercentage": 0.5},
            {"id": "application_1_0002", "state": "FINISHED", "finalStatus": "KILLED", "allocatedMB": -1}
        ]));
        let set = extract_applications(apps, &records);

        let state = "application_applicationState";
        assert_eq!(set.value_where(state, "applicationID", "application_1_0001"), Some(1.0));
        assert_eq!(set.value_where(state, "applicationID", "application_1_0002"), Some(3.0));
        assert_eq!(set.value_where("application_allocatedMB", "applicationID", "application_1_0001"), Some(2048.0));
        assert_eq!(set.value_where("application_allocatedMB", "applicationID", "application_1_0002"), None);
        assert_eq!(set.count("application_runningContainers"), 1);
        assert_eq!(set.samples()[0].label("user"), Some("hive"));
    }
}
