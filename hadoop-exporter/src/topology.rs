use std::fmt;

use serde::Serialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Plaintext,
    Encrypted,
}

impl Protocol {
    pub fn scheme(self) -> &'static str {
        match self {
            Protocol::Plaintext => "http",
            Protocol::Encrypted => "https",
        }
    }
}

/// One daemon web endpoint. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, protocol: Protocol) -> Self {
        Self { host: host.into(), port, protocol }
    }

    pub fn url(&self) -> String {
        if self.host.contains(':') {
            format!("{}://[{}]:{}", self.protocol.scheme(), self.host, self.port)
        } else {
            format!("{}://{}:{}", self.protocol.scheme(), self.host, self.port)
        }
    }

    /// `path` must start with `/` and may carry a query string.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.url(), path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// HA layout of the monitored group as seen from this host.
///
/// `self_endpoint` is where this process expects the local daemon; it is also
/// the initial scrape target. `peers` lists every configured member in config
/// order, with the local member (when identified) rewritten to `self_endpoint`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceTopology {
    pub self_endpoint: Endpoint,
    pub peers: Vec<Endpoint>,
    /// Nameservice or YARN cluster id; empty when not configured.
    pub group_id: String,
    /// HA member id of the local host; empty when no member matched.
    pub member_id: String,
    pub rpc_port: Option<u16>,
    pub local_hostname: String,
}

impl ServiceTopology {
    pub fn server_ip(&self) -> &str {
        &self.self_endpoint.host
    }

    pub fn is_identified(&self) -> bool {
        !self.member_id.is_empty() || (self.peers.len() == 1 && self.peers[0] == self.self_endpoint)
    }

    pub fn knows(&self, endpoint: &Endpoint) -> bool {
        *endpoint == self.self_endpoint || self.peers.contains(endpoint)
    }
}

/// Host portion of `host:port`, or the whole string when there is no port.
pub fn host_part(address: &str) -> &str {
    let address = address.trim();
    if let Some(rest) = address.strip_prefix('[') {
        if let Some((host, _)) = rest.split_once(']') {
            return host;
        }
    }
    match address.rsplit_once(':') {
        Some((host, _)) => host,
        None => address,
    }
}

/// Port after the last colon of `host:port`.
pub fn port_part(address: &str) -> Result<u16, ConfigError> {
    address
        .trim()
        .rsplit_once(':')
        .and_then(|(_, port)| port.parse().ok())
        .ok_or_else(|| ConfigError::InvalidAddress(address.to_string()))
}
