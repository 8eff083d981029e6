/*!
Config resolver: site file + local host identity -> `ServiceTopology`.

Runs once at startup. Each daemon kind describes its HA group with a different
set of keys; they are normalised here into a list of members, each with an
identity address (used to recognise the local member) and a web address (the
scrape target).
*/

use std::collections::HashMap;
use std::net::{IpAddr, ToSocketAddrs};

use tracing::{debug, info, warn};

use crate::daemon::DaemonKind;
use crate::error::ConfigError;
use crate::site::SiteConfig;
use crate::topology::{host_part, port_part, Endpoint, Protocol, ServiceTopology};

const YARN_WEBAPP_PORT: u16 = 8088;
const YARN_WEBAPP_HTTPS_PORT: u16 = 8090;

/// Hostname to IP lookup. Only used at startup and for role correction.
pub trait HostResolver: Send + Sync {
    fn resolve(&self, host: &str) -> Option<IpAddr>;
}

/// Resolver backed by the operating system (hosts file, DNS).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> Option<IpAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Some(ip);
        }
        let addrs: Vec<IpAddr> = (host, 0).to_socket_addrs().ok()?.map(|a| a.ip()).collect();
        addrs
            .iter()
            .copied()
            .find(IpAddr::is_ipv4)
            .or_else(|| addrs.first().copied())
    }
}

/// Fixed host table. Literal IPs always resolve to themselves.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    table: HashMap<String, IpAddr>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, host: impl Into<String>, ip: IpAddr) -> Self {
        self.table.insert(host.into().to_ascii_lowercase(), ip);
        self
    }
}

impl HostResolver for StaticResolver {
    fn resolve(&self, host: &str) -> Option<IpAddr> {
        host.parse::<IpAddr>()
            .ok()
            .or_else(|| self.table.get(&host.to_ascii_lowercase()).copied())
    }
}

/// Hostname of this machine and the IP it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub hostname: String,
    pub ip: IpAddr,
}

impl HostIdentity {
    pub fn new(hostname: impl Into<String>, ip: IpAddr) -> Self {
        Self { hostname: hostname.into(), ip }
    }

    pub fn local(resolver: &dyn HostResolver) -> Result<Self, ConfigError> {
        let hostname = gethostname::gethostname().to_string_lossy().into_owned();
        if hostname.is_empty() {
            return Err(ConfigError::LocalHost("empty hostname".into()));
        }
        let ip = resolver
            .resolve(&hostname)
            .ok_or_else(|| ConfigError::LocalHost(format!("hostname '{hostname}' does not resolve")))?;
        Ok(Self { hostname, ip })
    }

    /// Exact match on hostname (case-insensitive) or IP literal.
    pub fn matches_host(&self, host: &str) -> bool {
        host.eq_ignore_ascii_case(&self.hostname) || host.parse::<IpAddr>().is_ok_and(|ip| ip == self.ip)
    }

    /// Fallback heuristic: the hostname appears somewhere in the address.
    /// Fragile with short names (`nn1` is contained in `nn10`).
    pub fn contained_in(&self, address: &str) -> bool {
        !self.hostname.is_empty() && address.contains(self.hostname.as_str())
    }
}

#[derive(Debug, Clone)]
struct Member {
    id: String,
    identity: Option<String>,
    web: Option<String>,
}

#[derive(Debug)]
enum RpcSource {
    SelfIdentity,
    Address(Option<String>),
    Unused,
}

#[derive(Debug)]
struct GroupLayout {
    group_id: String,
    members: Vec<Member>,
    /// The only member is this host, no identification needed.
    local_only: bool,
    rpc: RpcSource,
    web_key: &'static str,
}

/// Resolve the HA topology of `kind` as seen from `local`.
pub fn resolve_topology(
    kind: DaemonKind,
    site: &SiteConfig,
    local: &HostIdentity,
    resolver: &dyn HostResolver,
) -> Result<ServiceTopology, ConfigError> {
    let protocol = match site.get(kind.http_policy_key()) {
        Some(policy) if policy.eq_ignore_ascii_case("HTTPS_ONLY") => Protocol::Encrypted,
        _ => Protocol::Plaintext,
    };
    let layout = match kind {
        DaemonKind::NameNode => namenode_layout(site, protocol),
        DaemonKind::DataNode => datanode_layout(site, protocol),
        DaemonKind::ResourceManager => yarn_layout(site, protocol, "yarn.resourcemanager.resource-tracker.address"),
        DaemonKind::Applications => {
            let mut layout = yarn_layout(site, protocol, "yarn.resourcemanager.hostname");
            layout.rpc = RpcSource::Unused;
            layout
        }
    };

    let self_index = if layout.local_only {
        Some(0)
    } else {
        find_self(&layout.members, local)
    };

    let mut peers = Vec::with_capacity(layout.members.len());
    let mut self_port = None;
    for (index, member) in layout.members.iter().enumerate() {
        let Some(address) = member.web.as_deref() else {
            warn!(member = %member.id, key = layout.web_key, "member has no web address, skipping");
            continue;
        };
        let port = match port_part(address) {
            Ok(port) => port,
            Err(err) => {
                warn!(member = %member.id, error = %err, "skipping member");
                continue;
            }
        };
        let host = if Some(index) == self_index {
            self_port = Some(port);
            local.ip.to_string()
        } else {
            let host = host_part(address);
            match resolver.resolve(host) {
                Some(ip) => ip.to_string(),
                None => {
                    warn!(host, "cannot resolve peer host, keeping it literally");
                    host.to_string()
                }
            }
        };
        peers.push(Endpoint::new(host, port, protocol));
    }

    let port = self_port
        .or_else(|| peers.first().map(|p| p.port))
        .ok_or_else(|| ConfigError::MissingAddress {
            daemon: kind.slug(),
            keys: layout.web_key.to_string(),
        })?;
    let self_endpoint = Endpoint::new(local.ip.to_string(), port, protocol);

    let self_member = self_index.map(|i| &layout.members[i]);
    let member_id = self_member.map(|m| m.id.clone()).unwrap_or_default();
    let rpc_port = match &layout.rpc {
        RpcSource::SelfIdentity => self_member
            .and_then(|m| m.identity.as_deref())
            .and_then(|a| port_part(a).ok()),
        RpcSource::Address(address) => address.as_deref().and_then(|a| port_part(a).ok()),
        RpcSource::Unused => None,
    };

    if self_index.is_none() {
        warn!(
            hostname = %local.hostname,
            ip = %local.ip,
            "local host matches no configured {kind} member, identity labels stay empty"
        );
    }
    info!(
        daemon = %kind,
        self_endpoint = %self_endpoint,
        peers = peers.len(),
        group = %layout.group_id,
        member = %member_id,
        rpc_port = ?rpc_port,
        "resolved service topology"
    );

    Ok(ServiceTopology {
        self_endpoint,
        peers,
        group_id: layout.group_id,
        member_id,
        rpc_port,
        local_hostname: local.hostname.clone(),
    })
}

fn find_self(members: &[Member], local: &HostIdentity) -> Option<usize> {
    let exact = members.iter().position(|m| {
        m.identity
            .as_deref()
            .is_some_and(|address| local.matches_host(host_part(address)))
    });
    exact.or_else(|| {
        let found = members
            .iter()
            .position(|m| m.identity.as_deref().is_some_and(|a| local.contained_in(a)));
        if let Some(index) = found {
            debug!(member = %members[index].id, "self identified by hostname containment");
        }
        found
    })
}

/// `base.s1.s2` with empty suffixes dropped.
fn keyed(site: &SiteConfig, base: &str, suffixes: &[&str]) -> Option<String> {
    let parts: Vec<&str> = suffixes.iter().copied().filter(|s| !s.is_empty()).collect();
    let key = if parts.is_empty() {
        base.to_string()
    } else {
        format!("{base}.{}", parts.join("."))
    };
    site.get(&key).map(str::to_string)
}

fn split_ids(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn namenode_layout(site: &SiteConfig, protocol: Protocol) -> GroupLayout {
    let nameservice = site
        .get("dfs.internal.nameservices")
        .or_else(|| site.get("dfs.nameservices"))
        .and_then(|list| split_ids(list).into_iter().next())
        .unwrap_or_default();
    let web_key = match protocol {
        Protocol::Plaintext => "dfs.namenode.http-address",
        Protocol::Encrypted => "dfs.namenode.https-address",
    };
    let ids = if nameservice.is_empty() {
        Vec::new()
    } else {
        keyed(site, "dfs.ha.namenodes", &[&nameservice])
            .map(|list| split_ids(&list))
            .unwrap_or_default()
    };

    let members = if ids.is_empty() {
        vec![Member {
            id: String::new(),
            identity: keyed(site, "dfs.namenode.rpc-address", &[&nameservice])
                .or_else(|| keyed(site, "dfs.namenode.rpc-address", &[])),
            web: keyed(site, web_key, &[&nameservice]).or_else(|| keyed(site, web_key, &[])),
        }]
    } else {
        ids.into_iter()
            .map(|id| Member {
                identity: keyed(site, "dfs.namenode.rpc-address", &[&nameservice, &id]),
                web: keyed(site, web_key, &[&nameservice, &id]),
                id,
            })
            .collect()
    };

    GroupLayout {
        group_id: nameservice,
        members,
        local_only: false,
        rpc: RpcSource::SelfIdentity,
        web_key,
    }
}

fn datanode_layout(site: &SiteConfig, protocol: Protocol) -> GroupLayout {
    let web_key = match protocol {
        Protocol::Plaintext => "dfs.datanode.http.address",
        Protocol::Encrypted => "dfs.datanode.https.address",
    };
    GroupLayout {
        group_id: String::new(),
        members: vec![Member {
            id: String::new(),
            identity: None,
            web: keyed(site, web_key, &[]),
        }],
        local_only: true,
        rpc: RpcSource::Address(keyed(site, "dfs.datanode.ipc.address", &[])),
        web_key,
    }
}

fn yarn_layout(site: &SiteConfig, protocol: Protocol, identity_key: &str) -> GroupLayout {
    let (web_key, default_port) = match protocol {
        Protocol::Plaintext => ("yarn.resourcemanager.webapp.address", YARN_WEBAPP_PORT),
        Protocol::Encrypted => ("yarn.resourcemanager.webapp.https.address", YARN_WEBAPP_HTTPS_PORT),
    };
    let cluster_id = keyed(site, "yarn.resourcemanager.cluster-id", &[]).unwrap_or_default();
    let ids = keyed(site, "yarn.resourcemanager.ha.rm-ids", &[])
        .map(|list| split_ids(&list))
        .unwrap_or_default();
    let ids = if ids.is_empty() { vec![String::new()] } else { ids };

    let members = ids
        .into_iter()
        .map(|id| {
            // Without an explicit webapp address YARN listens on the RM hostname.
            let web = keyed(site, web_key, &[&id]).or_else(|| {
                keyed(site, "yarn.resourcemanager.hostname", &[&id])
                    .map(|host| format!("{}:{default_port}", host_part(&host)))
            });
            Member {
                identity: keyed(site, identity_key, &[&id]),
                web,
                id,
            }
        })
        .collect();

    GroupLayout {
        group_id: cluster_id,
        members,
        local_only: false,
        rpc: RpcSource::SelfIdentity,
        web_key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn ha_hdfs(policy: &str) -> SiteConfig {
        SiteConfig::from_pairs([
            ("dfs.nameservices", "ns1"),
            ("dfs.ha.namenodes.ns1", "id1,id2"),
            ("dfs.namenode.rpc-address.ns1.id1", "10.0.0.1:8020"),
            ("dfs.namenode.rpc-address.ns1.id2", "10.0.0.2:8020"),
            ("dfs.namenode.http-address.ns1.id1", "10.0.0.1:9870"),
            ("dfs.namenode.http-address.ns1.id2", "10.0.0.2:9870"),
            ("dfs.namenode.https-address.ns1.id1", "10.0.0.1:9871"),
            ("dfs.namenode.https-address.ns1.id2", "10.0.0.2:9871"),
            ("dfs.http.policy", policy),
        ])
    }

    #[test]
    fn namenode_self_endpoint_from_local_ip() {
        let local = HostIdentity::new("nn-a", ip(1));
        let topology =
            resolve_topology(DaemonKind::NameNode, &ha_hdfs("HTTP_ONLY"), &local, &StaticResolver::new()).unwrap();

        assert_eq!(topology.self_endpoint.url(), "http://10.0.0.1:9870");
        assert_eq!(topology.group_id, "ns1");
        assert_eq!(topology.member_id, "id1");
        assert_eq!(topology.rpc_port, Some(8020));
        assert_eq!(
            topology.peers,
            vec![
                Endpoint::new("10.0.0.1", 9870, Protocol::Plaintext),
                Endpoint::new("10.0.0.2", 9870, Protocol::Plaintext),
            ]
        );
        assert!(topology.is_identified());
    }

    #[test]
    fn https_only_switches_the_whole_group() {
        let local = HostIdentity::new("nn-b", ip(2));
        let topology =
            resolve_topology(DaemonKind::NameNode, &ha_hdfs("HTTPS_ONLY"), &local, &StaticResolver::new()).unwrap();

        assert_eq!(topology.self_endpoint.url(), "https://10.0.0.2:9871");
        assert_eq!(topology.member_id, "id2");
        assert!(topology.peers.iter().all(|p| p.protocol == Protocol::Encrypted));
    }

    #[test]
    fn unmatched_host_keeps_empty_identity() {
        let local = HostIdentity::new("gateway", ip(9));
        let topology =
            resolve_topology(DaemonKind::NameNode, &ha_hdfs(""), &local, &StaticResolver::new()).unwrap();

        assert_eq!(topology.member_id, "");
        assert_eq!(topology.rpc_port, None);
        assert_eq!(topology.self_endpoint, Endpoint::new("10.0.0.9", 9870, Protocol::Plaintext));
        assert!(!topology.knows(&Endpoint::new("10.0.0.9", 1, Protocol::Plaintext)));
    }

    #[test]
    fn containment_is_the_fallback_for_self_match() {
        let site = SiteConfig::from_pairs([
            ("dfs.nameservices", "ns1"),
            ("dfs.ha.namenodes.ns1", "nn1,nn2"),
            ("dfs.namenode.rpc-address.ns1.nn1", "master1.corp:8020"),
            ("dfs.namenode.rpc-address.ns1.nn2", "master2.corp:8020"),
            ("dfs.namenode.http-address.ns1.nn1", "master1.corp:9870"),
            ("dfs.namenode.http-address.ns1.nn2", "master2.corp:9870"),
        ]);
        let resolver = StaticResolver::new().with("master1.corp", ip(1));
        let local = HostIdentity::new("master2", ip(2));
        let topology = resolve_topology(DaemonKind::NameNode, &site, &local, &resolver).unwrap();

        assert_eq!(topology.member_id, "nn2");
        assert_eq!(topology.peers[0].host, "10.0.0.1");
        assert_eq!(topology.peers[1].host, "10.0.0.2");
    }

    #[test]
    fn unresolvable_peer_keeps_literal_host() {
        let site = SiteConfig::from_pairs([
            ("dfs.nameservices", "ns1"),
            ("dfs.ha.namenodes.ns1", "nn1,nn2"),
            ("dfs.namenode.rpc-address.ns1.nn1", "10.0.0.1:8020"),
            ("dfs.namenode.rpc-address.ns1.nn2", "ghost.corp:8020"),
            ("dfs.namenode.http-address.ns1.nn1", "10.0.0.1:9870"),
            ("dfs.namenode.http-address.ns1.nn2", "ghost.corp:9870"),
        ]);
        let local = HostIdentity::new("nn-a", ip(1));
        let topology = resolve_topology(DaemonKind::NameNode, &site, &local, &StaticResolver::new()).unwrap();
        assert_eq!(topology.peers[1].host, "ghost.corp");
    }

    #[test]
    fn non_ha_namenode_uses_plain_keys() {
        let site = SiteConfig::from_pairs([
            ("dfs.namenode.rpc-address", "solo:8020"),
            ("dfs.namenode.http-address", "solo:50070"),
        ]);
        let local = HostIdentity::new("solo", ip(5));
        let topology = resolve_topology(DaemonKind::NameNode, &site, &local, &StaticResolver::new()).unwrap();

        assert_eq!(topology.self_endpoint.url(), "http://10.0.0.5:50070");
        assert_eq!(topology.peers.len(), 1);
        assert_eq!(topology.rpc_port, Some(8020));
        assert_eq!(topology.group_id, "");
    }

    #[test]
    fn datanode_is_always_local() {
        let site = SiteConfig::from_pairs([
            ("dfs.datanode.http.address", "0.0.0.0:9864"),
            ("dfs.datanode.ipc.address", "0.0.0.0:9867"),
        ]);
        let local = HostIdentity::new("worker7", ip(7));
        let topology = resolve_topology(DaemonKind::DataNode, &site, &local, &StaticResolver::new()).unwrap();

        assert_eq!(topology.self_endpoint.url(), "http://10.0.0.7:9864");
        assert_eq!(topology.peers, vec![topology.self_endpoint.clone()]);
        assert_eq!(topology.rpc_port, Some(9867));
        assert!(topology.is_identified());
    }

    fn ha_yarn() -> SiteConfig {
        SiteConfig::from_pairs([
            ("yarn.resourcemanager.cluster-id", "yarn-prod"),
            ("yarn.resourcemanager.ha.rm-ids", "rm1,rm2"),
            ("yarn.resourcemanager.hostname.rm1", "rm-a.corp"),
            ("yarn.resourcemanager.hostname.rm2", "rm-b.corp"),
            ("yarn.resourcemanager.resource-tracker.address.rm1", "rm-a.corp:8031"),
            ("yarn.resourcemanager.resource-tracker.address.rm2", "rm-b.corp:8031"),
            ("yarn.resourcemanager.webapp.address.rm1", "rm-a.corp:8088"),
        ])
    }

    #[test]
    fn resourcemanager_falls_back_to_hostname_for_web_address() {
        let resolver = StaticResolver::new().with("rm-a.corp", ip(1)).with("rm-b.corp", ip(2));
        let local = HostIdentity::new("rm-b.corp", ip(2));
        let topology = resolve_topology(DaemonKind::ResourceManager, &ha_yarn(), &local, &resolver).unwrap();

        assert_eq!(topology.group_id, "yarn-prod");
        assert_eq!(topology.member_id, "rm2");
        assert_eq!(topology.rpc_port, Some(8031));
        assert_eq!(topology.self_endpoint.url(), "http://10.0.0.2:8088");
        assert_eq!(topology.peers[0].url(), "http://10.0.0.1:8088");
    }

    #[test]
    fn applications_match_on_rm_hostname() {
        let resolver = StaticResolver::new().with("rm-a.corp", ip(1)).with("rm-b.corp", ip(2));
        let local = HostIdentity::new("rm-a.corp", ip(1));
        let topology = resolve_topology(DaemonKind::Applications, &ha_yarn(), &local, &resolver).unwrap();

        assert_eq!(topology.member_id, "rm1");
        assert_eq!(topology.rpc_port, None);
        assert_eq!(topology.peers.len(), 2);
    }

    #[test]
    fn no_address_at_all_is_fatal() {
        let local = HostIdentity::new("nn-a", ip(1));
        let err = resolve_topology(DaemonKind::NameNode, &SiteConfig::default(), &local, &StaticResolver::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingAddress { daemon: "namenode", .. }));
    }

    #[test]
    fn identity_matching_rules() {
        let local = HostIdentity::new("Master1", ip(1));
        assert!(local.matches_host("master1"));
        assert!(local.matches_host("10.0.0.1"));
        assert!(!local.matches_host("master10"));
        assert!(local.contained_in("Master1.corp:8020"));
        assert!(!HostIdentity::new("", ip(1)).contained_in("anything"));
    }
}
