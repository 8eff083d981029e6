/*!
Static metric catalog per daemon kind.

Every exported gauge is declared here once: which bean it comes from, which
field holds the value and what it is called on the wire. The catalog is
resolved against the topology at startup so that port-specific bean names
(`RpcActivityForPort8020`) are fixed before the first scrape.
*/

use crate::bean::RawBean;
use crate::daemon::DaemonKind;
use crate::topology::ServiceTopology;

pub const NAMENODE_LABELS: &[&str] = &["serverip", "nameservice", "namenodeid"];
pub const DATANODE_LABELS: &[&str] = &["serverip"];
pub const RESOURCEMANAGER_LABELS: &[&str] = &["serverip", "clusterid", "resourcemanagerid"];
pub const APPLICATION_LABELS: &[&str] = &["applicationID", "amContainer", "applicationType", "name", "user"];
pub const APPLICATION_LIVENESS_LABELS: &[&str] = &["serverip", "clusterid"];

/// Where a value sits inside a bean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Key(&'static str),
    Nested(&'static str, &'static str),
    /// Value set by the exporter itself (liveness, lifecycle state).
    Computed,
}

impl Field {
    pub fn read(self, bean: &RawBean) -> Option<f64> {
        match self {
            Field::Key(key) => bean.number(key),
            Field::Nested(outer, inner) => bean.nested_number(outer, inner),
            Field::Computed => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricDefinition {
    pub name: String,
    pub help: String,
    pub label_names: &'static [&'static str],
    pub field: Field,
}

impl MetricDefinition {
    fn new(kind: DaemonKind, counter: &str, help: &str, labels: &'static [&'static str], field: Field) -> Self {
        Self {
            name: format!("{}_{counter}", kind.metric_prefix()),
            help: help.to_string(),
            label_names: labels,
            field,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeanMatcher {
    Exact(String),
    /// Beans whose name embeds host or port details, e.g. `DataNodeActivity-<host>-<port>`.
    Prefix(String),
}

impl BeanMatcher {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            BeanMatcher::Exact(exact) => name == exact,
            BeanMatcher::Prefix(prefix) => name.starts_with(prefix.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BeanGroup {
    pub matcher: BeanMatcher,
    pub metrics: Vec<MetricDefinition>,
}

/// Bean carrying the daemon's own view of its HA role.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleSource {
    pub matcher: BeanMatcher,
    /// Field whose value is `active` on the active member.
    pub state_key: Option<&'static str>,
    /// Field naming the host that produced the payload.
    pub host_key: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppCatalog {
    pub state: MetricDefinition,
    pub always: Vec<MetricDefinition>,
    pub running_only: Vec<MetricDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogBody {
    Beans(Vec<BeanGroup>),
    Applications(AppCatalog),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricCatalog {
    pub kind: DaemonKind,
    pub body: CatalogBody,
    pub server_active: MetricDefinition,
    pub is_active: Option<MetricDefinition>,
    pub role: Option<RoleSource>,
}

type Counters = &'static [(&'static str, Field, &'static str)];

const HEAP_MEMORY: Counters = &[
    ("heapMemoryUsageCommitted", Field::Nested("HeapMemoryUsage", "committed"), "Committed JVM heap in bytes"),
    ("heapMemoryUsageInit", Field::Nested("HeapMemoryUsage", "init"), "Initial JVM heap in bytes"),
    ("heapMemoryUsageMax", Field::Nested("HeapMemoryUsage", "max"), "Maximum JVM heap in bytes"),
    ("heapMemoryUsageUsed", Field::Nested("HeapMemoryUsage", "used"), "Used JVM heap in bytes"),
];

const OPERATING_SYSTEM: Counters = &[
    ("SystemLoadAverage", Field::Key("SystemLoadAverage"), "System load average"),
    ("MaxFileDescriptorCount", Field::Key("MaxFileDescriptorCount"), "Maximum file descriptors"),
    ("OpenFileDescriptorCount", Field::Key("OpenFileDescriptorCount"), "Open file descriptors"),
    ("TotalPhysicalMemorySize", Field::Key("TotalPhysicalMemorySize"), "Total physical memory in bytes"),
    ("FreePhysicalMemorySize", Field::Key("FreePhysicalMemorySize"), "Free physical memory in bytes"),
    ("AvailableProcessors", Field::Key("AvailableProcessors"), "Available processors"),
];

const JVM_LOG_EVENTS: Counters = &[
    ("LogFatal", Field::Key("LogFatal"), "FATAL log events"),
    ("LogError", Field::Key("LogError"), "ERROR log events"),
    ("LogWarn", Field::Key("LogWarn"), "WARN log events"),
    ("LogInfo", Field::Key("LogInfo"), "INFO log events"),
];

const RPC_ACTIVITY: Counters = &[
    ("RpcQueueTimeNumOps", Field::Key("RpcQueueTimeNumOps"), "RPC calls queued"),
    ("RpcQueueTimeAvgTime", Field::Key("RpcQueueTimeAvgTime"), "Average RPC queue time in ms"),
    ("RpcProcessingTimeNumOps", Field::Key("RpcProcessingTimeNumOps"), "RPC calls processed"),
    ("RpcProcessingTimeAvgTime", Field::Key("RpcProcessingTimeAvgTime"), "Average RPC processing time in ms"),
];

const DATANODE_RPC_EXTRA: Counters = &[
    ("ReceivedBytes", Field::Key("ReceivedBytes"), "RPC bytes received"),
    ("SentBytes", Field::Key("SentBytes"), "RPC bytes sent"),
    ("NumOpenConnections", Field::Key("NumOpenConnections"), "Open RPC connections"),
];

const FS_NAMESYSTEM: Counters = &[
    ("MissingBlocks", Field::Key("MissingBlocks"), "Missing blocks"),
    ("CapacityTotal", Field::Key("CapacityTotal"), "Total raw capacity in bytes"),
    ("CapacityUsed", Field::Key("CapacityUsed"), "Used DFS capacity in bytes"),
    ("CapacityRemaining", Field::Key("CapacityRemaining"), "Remaining capacity in bytes"),
    ("CapacityUsedNonDFS", Field::Key("CapacityUsedNonDFS"), "Capacity used by non-DFS data in bytes"),
    ("BlocksTotal", Field::Key("BlocksTotal"), "Allocated blocks"),
    ("FilesTotal", Field::Key("FilesTotal"), "Files and directories"),
    ("CorruptBlocks", Field::Key("CorruptBlocks"), "Corrupt blocks"),
    ("UnderReplicatedBlocks", Field::Key("UnderReplicatedBlocks"), "Under-replicated blocks"),
    ("ExcessBlocks", Field::Key("ExcessBlocks"), "Excess blocks"),
    ("PendingDeletionBlocks", Field::Key("PendingDeletionBlocks"), "Blocks pending deletion"),
    ("NumActiveClients", Field::Key("NumActiveClients"), "Active clients holding leases"),
    ("LastCheckpointTime", Field::Key("LastCheckpointTime"), "Last checkpoint time in ms since epoch"),
];

const FS_NAMESYSTEM_STATE: Counters = &[
    ("NumLiveDataNodes", Field::Key("NumLiveDataNodes"), "Live DataNodes"),
    ("NumDeadDataNodes", Field::Key("NumDeadDataNodes"), "Dead DataNodes"),
    ("NumDecomLiveDataNodes", Field::Key("NumDecomLiveDataNodes"), "Decommissioned live DataNodes"),
    ("NumDecomDeadDataNodes", Field::Key("NumDecomDeadDataNodes"), "Decommissioned dead DataNodes"),
    ("NumDecommissioningDataNodes", Field::Key("NumDecommissioningDataNodes"), "DataNodes being decommissioned"),
    ("VolumeFailuresTotal", Field::Key("VolumeFailuresTotal"), "Failed volumes across all DataNodes"),
    ("StaleDataNodes", Field::Key("NumStaleDataNodes"), "Stale DataNodes"),
];

const GC_COLLECTORS: &[&str] = &["ParNew", "ConcurrentMarkSweep"];

const NAMENODE_RUNTIME: Counters = &[("Uptime", Field::Key("Uptime"), "JVM uptime in ms")];

const NAMENODE_STATUS: Counters = &[(
    "LastHATransitionTime",
    Field::Key("LastHATransitionTime"),
    "Last HA state transition in ms since epoch",
)];

const DATANODE_INFO: Counters = &[("XceiverCount", Field::Key("XceiverCount"), "Active data transfer threads")];

const FS_DATASET_STATE: Counters = &[
    ("CapacityTotal", Field::Key("Capacity"), "Configured capacity in bytes"),
    ("CapacityUsed", Field::Key("DfsUsed"), "Used DFS capacity in bytes"),
    ("CapacityRemaining", Field::Key("Remaining"), "Remaining capacity in bytes"),
];

const DATANODE_ACTIVITY: Counters = &[
    ("VolumeFailures", Field::Key("VolumeFailures"), "Failed volumes"),
    ("ReadBlockOpAvgTime", Field::Key("ReadBlockOpAvgTime"), "Average block read time in ms"),
    ("WriteBlockOpAvgTime", Field::Key("WriteBlockOpAvgTime"), "Average block write time in ms"),
    ("WritesFromRemoteClient", Field::Key("WritesFromRemoteClient"), "Writes from remote clients"),
    ("WritesFromLocalClient", Field::Key("WritesFromLocalClient"), "Writes from local clients"),
    ("ReadsFromRemoteClient", Field::Key("ReadsFromRemoteClient"), "Reads from remote clients"),
    ("ReadsFromLocalClient", Field::Key("ReadsFromLocalClient"), "Reads from local clients"),
    ("DatanodeNetworkErrors", Field::Key("DatanodeNetworkErrors"), "Network errors"),
];

const DATANODE_RUNTIME: Counters = &[("StartTime", Field::Key("StartTime"), "JVM start time in ms since epoch")];

const CLUSTER_METRICS: Counters = &[
    ("NumActiveNms", Field::Key("NumActiveNMs"), "Active NodeManagers"),
    ("NumLostNMs", Field::Key("NumLostNMs"), "Lost NodeManagers"),
    ("NumDecommissioningNMs", Field::Key("NumDecommissioningNMs"), "Decommissioning NodeManagers"),
    ("NumDecommissionedNMs", Field::Key("NumDecommissionedNMs"), "Decommissioned NodeManagers"),
    ("NumUnhealthyNMs", Field::Key("NumUnhealthyNMs"), "Unhealthy NodeManagers"),
    ("NumRebootedNMs", Field::Key("NumRebootedNMs"), "Rebooted NodeManagers"),
    ("NumShutdownNMs", Field::Key("NumShutdownNMs"), "NodeManagers shut down"),
    ("AMLaunchDelayNumOps", Field::Key("AMLaunchDelayNumOps"), "ApplicationMaster launches"),
    ("AMLaunchDelayAvgTime", Field::Key("AMLaunchDelayAvgTime"), "Average ApplicationMaster launch delay in ms"),
    ("AMRegisterDelayNumOps", Field::Key("AMRegisterDelayNumOps"), "ApplicationMaster registrations"),
    ("AMRegisterDelayAvgTime", Field::Key("AMRegisterDelayAvgTime"), "Average ApplicationMaster register delay in ms"),
];

const ROOT_QUEUE: Counters = &[
    ("AllocatedVCores", Field::Key("AllocatedVCores"), "Allocated vcores"),
    ("ReservedVCores", Field::Key("ReservedVCores"), "Reserved vcores"),
    ("AvailableVCores", Field::Key("AvailableVCores"), "Available vcores"),
    ("PendingVCores", Field::Key("PendingVCores"), "Pending vcores"),
    ("AllocatedMB", Field::Key("AllocatedMB"), "Allocated memory in MB"),
    ("AvailableMB", Field::Key("AvailableMB"), "Available memory in MB"),
    ("PendingMB", Field::Key("PendingMB"), "Pending memory in MB"),
    ("ReservedMB", Field::Key("ReservedMB"), "Reserved memory in MB"),
    ("AppsSubmitted", Field::Key("AppsSubmitted"), "Applications submitted"),
    ("AppsRunning", Field::Key("AppsRunning"), "Applications running"),
    ("AppsPending", Field::Key("AppsPending"), "Applications pending"),
    ("AppsCompleted", Field::Key("AppsCompleted"), "Applications completed"),
    ("AppsKilled", Field::Key("AppsKilled"), "Applications killed"),
    ("AppsFailed", Field::Key("AppsFailed"), "Applications failed"),
    ("running_0", Field::Key("running_0"), "Applications running for less than 60 minutes"),
    ("running_60", Field::Key("running_60"), "Applications running for 60 to 300 minutes"),
    ("running_300", Field::Key("running_300"), "Applications running for 300 to 1440 minutes"),
    ("running_1440", Field::Key("running_1440"), "Applications running for more than 1440 minutes"),
];

const RESOURCEMANAGER_RUNTIME: Counters = &[
    ("StartTime", Field::Key("StartTime"), "JVM start time in ms since epoch"),
    ("Uptime", Field::Key("Uptime"), "JVM uptime in ms"),
];

const APP_ALWAYS: Counters = &[
    ("startedTime", Field::Key("startedTime"), "The application's start time"),
    ("finishedTime", Field::Key("finishedTime"), "The application's finish time"),
    ("elapsedTime", Field::Key("elapsedTime"), "The application's elapsed time"),
    ("memorySeconds", Field::Key("memorySeconds"), "The application's memory seconds"),
    ("vcoreSeconds", Field::Key("vcoreSeconds"), "The application's vcore seconds"),
];

const APP_RUNNING_ONLY: Counters = &[
    ("allocatedMB", Field::Key("allocatedMB"), "Memory allocated to the running application in MB"),
    ("allocatedVCores", Field::Key("allocatedVCores"), "Vcores allocated to the running application"),
    ("reservedMB", Field::Key("reservedMB"), "Memory reserved for the running application in MB"),
    ("reservedVCores", Field::Key("reservedVCores"), "Vcores reserved for the running application"),
    ("runningContainers", Field::Key("runningContainers"), "Containers of the running application"),
    ("queueUsagePercentage", Field::Key("queueUsagePercentage"), "Share of the queue used by the application"),
    ("clusterUsagePercentage", Field::Key("clusterUsagePercentage"), "Share of the cluster used by the application"),
];

struct Builder {
    kind: DaemonKind,
    labels: &'static [&'static str],
    groups: Vec<BeanGroup>,
}

impl Builder {
    fn new(kind: DaemonKind, labels: &'static [&'static str]) -> Self {
        Self { kind, labels, groups: Vec::new() }
    }

    fn defs(&self, counters: &[Counters]) -> Vec<MetricDefinition> {
        counters
            .iter()
            .flat_map(|c| c.iter())
            .map(|(counter, field, help)| MetricDefinition::new(self.kind, counter, help, self.labels, *field))
            .collect()
    }

    fn exact(mut self, bean: impl Into<String>, counters: &[Counters]) -> Self {
        let metrics = self.defs(counters);
        self.groups.push(BeanGroup { matcher: BeanMatcher::Exact(bean.into()), metrics });
        self
    }

    fn matching(mut self, matcher: BeanMatcher, counters: &[Counters]) -> Self {
        let metrics = self.defs(counters);
        self.groups.push(BeanGroup { matcher, metrics });
        self
    }

    fn gc(mut self) -> Self {
        for collector in GC_COLLECTORS {
            let metrics = vec![
                MetricDefinition::new(
                    self.kind,
                    &format!("{collector}_CollectionCount"),
                    &format!("{collector} collections"),
                    self.labels,
                    Field::Key("CollectionCount"),
                ),
                MetricDefinition::new(
                    self.kind,
                    &format!("{collector}_CollectionTime"),
                    &format!("{collector} collection time in ms"),
                    self.labels,
                    Field::Key("CollectionTime"),
                ),
            ];
            self.groups.push(BeanGroup {
                matcher: BeanMatcher::Exact(format!("java.lang:type=GarbageCollector,name={collector}")),
                metrics,
            });
        }
        self
    }
}

/// `RpcActivityForPort<port>`, or any RPC activity bean when the port is unknown.
fn rpc_matcher(service: &str, port: Option<u16>) -> BeanMatcher {
    let base = format!("Hadoop:service={service},name=RpcActivityForPort");
    match port {
        Some(port) => BeanMatcher::Exact(format!("{base}{port}")),
        None => BeanMatcher::Prefix(base),
    }
}

impl MetricCatalog {
    pub fn for_topology(kind: DaemonKind, topology: &ServiceTopology) -> Self {
        match kind {
            DaemonKind::NameNode => Self::namenode(topology.rpc_port),
            DaemonKind::DataNode => Self::datanode(topology.rpc_port),
            DaemonKind::ResourceManager => Self::resourcemanager(topology.rpc_port),
            DaemonKind::Applications => Self::applications(),
        }
    }

    fn namenode(rpc_port: Option<u16>) -> Self {
        let kind = DaemonKind::NameNode;
        let groups = Builder::new(kind, NAMENODE_LABELS)
            .exact("Hadoop:service=NameNode,name=FSNamesystem", &[FS_NAMESYSTEM])
            .exact("Hadoop:service=NameNode,name=FSNamesystemState", &[FS_NAMESYSTEM_STATE])
            .matching(rpc_matcher("NameNode", rpc_port), &[RPC_ACTIVITY])
            .gc()
            .exact("java.lang:type=Memory", &[HEAP_MEMORY])
            .exact("Hadoop:service=NameNode,name=JvmMetrics", &[JVM_LOG_EVENTS])
            .exact("java.lang:type=Runtime", &[NAMENODE_RUNTIME])
            .exact("java.lang:type=OperatingSystem", &[OPERATING_SYSTEM])
            .exact("Hadoop:service=NameNode,name=NameNodeStatus", &[NAMENODE_STATUS])
            .groups;
        Self {
            kind,
            body: CatalogBody::Beans(groups),
            server_active: liveness(kind, "ServerActive", "Whether the NameNode web endpoint answered", NAMENODE_LABELS),
            is_active: Some(liveness(kind, "isActive", "Whether this NameNode is the active member", NAMENODE_LABELS)),
            role: Some(RoleSource {
                matcher: BeanMatcher::Exact("Hadoop:service=NameNode,name=NameNodeStatus".into()),
                state_key: Some("State"),
                host_key: "HostAndPort",
            }),
        }
    }

    fn datanode(rpc_port: Option<u16>) -> Self {
        let kind = DaemonKind::DataNode;
        let groups = Builder::new(kind, DATANODE_LABELS)
            .exact("Hadoop:service=DataNode,name=DataNodeInfo", &[DATANODE_INFO])
            .exact("Hadoop:service=DataNode,name=FSDatasetState", &[FS_DATASET_STATE])
            .matching(
                BeanMatcher::Prefix("Hadoop:service=DataNode,name=DataNodeActivity-".into()),
                &[DATANODE_ACTIVITY],
            )
            .matching(rpc_matcher("DataNode", rpc_port), &[RPC_ACTIVITY, DATANODE_RPC_EXTRA])
            .exact("java.lang:type=Memory", &[HEAP_MEMORY])
            .exact("java.lang:type=Runtime", &[DATANODE_RUNTIME])
            .exact("java.lang:type=OperatingSystem", &[OPERATING_SYSTEM])
            .groups;
        Self {
            kind,
            body: CatalogBody::Beans(groups),
            server_active: liveness(kind, "ServerActive", "Whether the DataNode web endpoint answered", DATANODE_LABELS),
            is_active: None,
            role: None,
        }
    }

    fn resourcemanager(rpc_port: Option<u16>) -> Self {
        let kind = DaemonKind::ResourceManager;
        let groups = Builder::new(kind, RESOURCEMANAGER_LABELS)
            .exact("Hadoop:service=ResourceManager,name=ClusterMetrics", &[CLUSTER_METRICS])
            .exact("Hadoop:service=ResourceManager,name=QueueMetrics,q0=root,q1=default", &[ROOT_QUEUE])
            .matching(rpc_matcher("ResourceManager", rpc_port), &[RPC_ACTIVITY])
            .exact("java.lang:type=Memory", &[HEAP_MEMORY])
            .exact("Hadoop:service=ResourceManager,name=JvmMetrics", &[JVM_LOG_EVENTS])
            .exact("java.lang:type=Runtime", &[RESOURCEMANAGER_RUNTIME])
            .exact("java.lang:type=OperatingSystem", &[OPERATING_SYSTEM])
            .groups;
        Self {
            kind,
            body: CatalogBody::Beans(groups),
            server_active: liveness(
                kind,
                "ServerActive",
                "Whether the ResourceManager web endpoint answered",
                RESOURCEMANAGER_LABELS,
            ),
            is_active: Some(liveness(
                kind,
                "isActive",
                "Whether this ResourceManager is the active member",
                RESOURCEMANAGER_LABELS,
            )),
            role: Some(RoleSource {
                matcher: BeanMatcher::Exact("Hadoop:service=ResourceManager,name=ClusterMetrics".into()),
                state_key: None,
                host_key: "tag.Hostname",
            }),
        }
    }

    fn applications() -> Self {
        let kind = DaemonKind::Applications;
        let builder = Builder::new(kind, APPLICATION_LABELS);
        let apps = AppCatalog {
            state: MetricDefinition::new(
                kind,
                "applicationState",
                "The application state 0,1,2,3",
                APPLICATION_LABELS,
                Field::Computed,
            ),
            always: builder.defs(&[APP_ALWAYS]),
            running_only: builder.defs(&[APP_RUNNING_ONLY]),
        };
        Self {
            kind,
            body: CatalogBody::Applications(apps),
            server_active: liveness(
                kind,
                "ServerActive",
                "Whether the active ResourceManager REST endpoint answered",
                APPLICATION_LIVENESS_LABELS,
            ),
            is_active: None,
            role: None,
        }
    }

    /// Every definition, liveness gauges included.
    pub fn definitions(&self) -> Vec<&MetricDefinition> {
        let mut all: Vec<&MetricDefinition> = match &self.body {
            CatalogBody::Beans(groups) => groups.iter().flat_map(|g| g.metrics.iter()).collect(),
            CatalogBody::Applications(apps) => std::iter::once(&apps.state)
                .chain(apps.always.iter())
                .chain(apps.running_only.iter())
                .collect(),
        };
        all.push(&self.server_active);
        all.extend(self.is_active.as_ref());
        all
    }
}

fn liveness(kind: DaemonKind, counter: &str, help: &str, labels: &'static [&'static str]) -> MetricDefinition {
    MetricDefinition::new(kind, counter, help, labels, Field::Computed)
}
