/*!
# Hadoop exporter

HA-aware Prometheus exporter for Hadoop daemons. One process watches one
daemon kind (NameNode, DataNode, ResourceManager or the YARN applications
list), resolves its HA group from the local `*-site.xml`, and on every
Prometheus scrape queries the active member, failing over to a peer when
the current one stops answering.
*/

pub mod bean;
pub mod catalog;
pub mod daemon;
pub mod error;
pub mod exporter;
pub mod extract;
pub mod health;
pub mod http;
pub mod metric_set;
pub mod resolver;
pub mod scrape;
pub mod settings;
pub mod site;
pub mod topology;
pub mod tracker;

pub use daemon::DaemonKind;
pub use error::{ConfigError, ScrapeError};
pub use exporter::{CycleReport, Exporter};
pub use metric_set::MetricSet;
pub use resolver::{resolve_topology, HostIdentity, HostResolver, StaticResolver, SystemResolver};
pub use settings::{Settings, SettingsLayer};
pub use site::SiteConfig;
pub use topology::{Endpoint, Protocol, ServiceTopology};
pub use tracker::{EndpointState, LivenessState, TargetTracker};
