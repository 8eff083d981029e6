use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::bean::PayloadShape;

/// The four exporter flavours. One process exports exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonKind {
    NameNode,
    DataNode,
    ResourceManager,
    Applications,
}

impl DaemonKind {
    pub const ALL: [DaemonKind; 4] = [
        DaemonKind::NameNode,
        DaemonKind::DataNode,
        DaemonKind::ResourceManager,
        DaemonKind::Applications,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            DaemonKind::NameNode => "namenode",
            DaemonKind::DataNode => "datanode",
            DaemonKind::ResourceManager => "resourcemanager",
            DaemonKind::Applications => "applications",
        }
    }

    /// Metric name prefix, e.g. `NameNode_MissingBlocks`.
    pub fn metric_prefix(self) -> &'static str {
        match self {
            DaemonKind::NameNode => "NameNode",
            DaemonKind::DataNode => "DataNode",
            DaemonKind::ResourceManager => "ResourceManager",
            DaemonKind::Applications => "application",
        }
    }

    pub fn default_listen_address(self) -> &'static str {
        match self {
            DaemonKind::NameNode => "0.0.0.0:9070",
            DaemonKind::DataNode => "0.0.0.0:9071",
            DaemonKind::ResourceManager => "0.0.0.0:9075",
            DaemonKind::Applications => "0.0.0.0:9077",
        }
    }

    pub fn default_site_path(self) -> &'static str {
        match self {
            DaemonKind::NameNode | DaemonKind::DataNode => "/etc/hadoop/conf/hdfs-site.xml",
            DaemonKind::ResourceManager | DaemonKind::Applications => {
                "/etc/hadoop/conf/yarn-site.xml"
            }
        }
    }

    pub fn introspection_path(self) -> &'static str {
        match self {
            DaemonKind::Applications => {
                "/ws/v1/cluster/apps?deSelects=resourceRequests&state=RUNNING,FINISHED,FAILED,KILLED"
            }
            _ => "/jmx",
        }
    }

    pub fn payload_shape(self) -> PayloadShape {
        match self {
            DaemonKind::Applications => PayloadShape::Applications,
            _ => PayloadShape::Beans,
        }
    }

    /// Daemons whose payload states their own HA role and host.
    pub fn reports_role(self) -> bool {
        matches!(self, DaemonKind::NameNode | DaemonKind::ResourceManager)
    }

    /// Config key whose `HTTPS_ONLY` value switches the whole group to TLS.
    pub fn http_policy_key(self) -> &'static str {
        match self {
            DaemonKind::NameNode | DaemonKind::DataNode => "dfs.http.policy",
            DaemonKind::ResourceManager | DaemonKind::Applications => "yarn.http.policy",
        }
    }
}

impl fmt::Display for DaemonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for DaemonKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "namenode" | "nn" => Ok(DaemonKind::NameNode),
            "datanode" | "dn" => Ok(DaemonKind::DataNode),
            "resourcemanager" | "rm" => Ok(DaemonKind::ResourceManager),
            "applications" | "application" | "apps" => Ok(DaemonKind::Applications),
            other => Err(format!(
                "unknown daemon '{other}', expected one of namenode, datanode, resourcemanager, applications"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_short_aliases() {
        assert_eq!("NameNode".parse::<DaemonKind>(), Ok(DaemonKind::NameNode));
        assert_eq!("rm".parse::<DaemonKind>(), Ok(DaemonKind::ResourceManager));
        assert_eq!("apps".parse::<DaemonKind>(), Ok(DaemonKind::Applications));
        assert!("journalnode".parse::<DaemonKind>().is_err());
    }

    #[test]
    fn only_role_reporting_daemons_publish_is_active() {
        assert!(DaemonKind::NameNode.reports_role());
        assert!(!DaemonKind::Applications.reports_role());
        assert_eq!(DaemonKind::Applications.introspection_path().split('?').next(), Some("/ws/v1/cluster/apps"));
    }

    #[test]
    fn default_ports_are_distinct() {
        let mut ports: Vec<_> = DaemonKind::ALL.iter().map(|k| k.default_listen_address()).collect();
        ports.sort_unstable();
        ports.dedup();
        assert_eq!(ports.len(), 4);
    }
}
