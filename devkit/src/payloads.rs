/*!
Builders for introspection payloads

Produce the JSON documents Hadoop daemons serve: `/jmx` bean lists and the
ResourceManager `/ws/v1/cluster/apps` listing.
*/

use serde_json::{json, Map, Value};

/// `{"beans": [...]}` document.
#[derive(Debug, Clone, Default)]
pub struct JmxPayload {
    beans: Vec<Value>,
}

impl JmxPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bean named `name` carrying `fields` (a JSON object).
    pub fn bean(mut self, name: &str, fields: Value) -> Self {
        let mut bean = Map::new();
        bean.insert("name".into(), Value::String(name.into()));
        if let Value::Object(fields) = fields {
            bean.extend(fields);
        }
        self.beans.push(Value::Object(bean));
        self
    }

    pub fn fs_namesystem(self, missing_blocks: f64, capacity_total: f64) -> Self {
        self.bean(
            "Hadoop:service=NameNode,name=FSNamesystem",
            json!({
                "MissingBlocks": missing_blocks,
                "CapacityTotal": capacity_total,
                "CapacityUsed": capacity_total / 4.0,
                "CapacityRemaining": capacity_total * 3.0 / 4.0,
                "BlocksTotal": 1200,
                "FilesTotal": 800
            }),
        )
    }

    pub fn namenode_status(self, state: &str, host_and_port: &str) -> Self {
        self.bean(
            "Hadoop:service=NameNode,name=NameNodeStatus",
            json!({
                "State": state,
                "HostAndPort": host_and_port,
                "LastHATransitionTime": 1700000000000_u64
            }),
        )
    }

    pub fn cluster_metrics(self, hostname: &str, active_nms: u32) -> Self {
        self.bean(
            "Hadoop:service=ResourceManager,name=ClusterMetrics",
            json!({
                "tag.Hostname": hostname,
                "NumActiveNMs": active_nms,
                "NumLostNMs": 0,
                "NumUnhealthyNMs": 0
            }),
        )
    }

    pub fn heap(self, used: u64, max: u64) -> Self {
        self.bean(
            "java.lang:type=Memory",
            json!({"HeapMemoryUsage": {"committed": max / 2, "init": max / 8, "max": max, "used": used}}),
        )
    }

    pub fn build(self) -> Value {
        json!({ "beans": self.beans })
    }
}

/// `{"apps": {"app": [...]}}` document.
#[derive(Debug, Clone, Default)]
pub struct AppsPayload {
    apps: Vec<Value>,
}

impl AppsPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn app(mut self, app: Value) -> Self {
        self.apps.push(app);
        self
    }

    pub fn build(self) -> Value {
        json!({ "apps": { "app": self.apps } })
    }

    /// What the RM returns when no application matches the filter.
    pub fn empty() -> Value {
        json!({ "apps": null })
    }
}

/// A complete application record. RUNNING records carry the allocation fields.
pub fn app_record(id: &str, state: &str, final_status: &str) -> Value {
    let mut app = json!({
        "id": id,
        "user": "hive",
        "name": format!("query-{id}"),
        "queue": "default",
        "state": state,
        "finalStatus": final_status,
        "applicationType": "TEZ",
        "startedTime": 1700000000000_u64,
        "finishedTime": if state == "RUNNING" { 0 } else { 1700000300000_u64 },
        "elapsedTime": 300000,
        "amContainerLogs": format!("http://nm1.corp:8042/node/containerlogs/container_{id}_01_000001/hive"),
        "memorySeconds": 4096,
        "vcoreSeconds": 12
    });
    if state == "RUNNING" {
        if let Value::Object(fields) = &mut app {
            fields.extend([
                ("allocatedMB".to_string(), json!(2048)),
                ("allocatedVCores".to_string(), json!(2)),
                ("reservedMB".to_string(), json!(0)),
                ("reservedVCores".to_string(), json!(0)),
                ("runningContainers".to_string(), json!(3)),
                ("queueUsagePercentage".to_string(), json!(12.5)),
                ("clusterUsagePercentage".to_string(), json!(4.2)),
            ]);
        }
    }
    app
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bean_name_comes_first_and_fields_merge() {
        let doc = JmxPayload::new().fs_namesystem(0.0, 1000.0).build();
        let bean = &doc["beans"][0];
        assert_eq!(bean["name"], "Hadoop:service=NameNode,name=FSNamesystem");
        assert_eq!(bean["CapacityTotal"], 1000.0);
    }

    #[test]
    fn finished_records_have_no_allocation() {
        let running = app_record("1_0001", "RUNNING", "UNDEFINED");
        let done = app_record("1_0002", "FINISHED", "KILLED");
        assert_eq!(running["allocatedMB"], 2048);
        assert!(done.get("allocatedMB").is_none());
        assert_eq!(AppsPayload::new().app(done).build()["apps"]["app"][0]["state"], "FINISHED");
    }
}
