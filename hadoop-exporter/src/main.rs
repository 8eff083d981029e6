/**
 * HADOOP EXPORTER - process entry point
 *
 * Bootstrap order: .env, logging, CLI + settings layers, site file, HA
 * topology, exporter, HTTP server. Any configuration problem stops the
 * process here, before the listener is bound.
 */

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hadoop_exporter::http::{build_router, AppState};
use hadoop_exporter::{
    resolve_topology, DaemonKind, Exporter, HostIdentity, HostResolver, Settings, SettingsLayer, SiteConfig,
    SystemResolver,
};

#[derive(Debug, Parser)]
#[command(name = "hadoop-exporter", version, about = "HA-aware Prometheus exporter for Hadoop daemons")]
struct Cli {
    /// Daemon to export: namenode, datanode, resourcemanager or applications
    daemon: DaemonKind,

    /// Address to listen on for telemetry (host:port or :port)
    #[arg(long = "web.listen-address", env = "HADOOP_EXPORTER_LISTEN_ADDRESS")]
    listen_address: Option<String>,

    /// Path under which to expose metrics
    #[arg(long = "web.telemetry-path", env = "HADOOP_EXPORTER_METRICS_PATH")]
    metrics_path: Option<String>,

    /// Hadoop site file describing the HA group
    #[arg(
        long = "site.path",
        visible_aliases = ["hdfs-site.path", "yarn-site.path"],
        env = "HADOOP_EXPORTER_SITE_PATH"
    )]
    site_path: Option<PathBuf>,

    /// Timeout of each introspection request, in seconds
    #[arg(long = "get.timeout-seconds", env = "HADOOP_EXPORTER_TIMEOUT_SECONDS")]
    timeout_seconds: Option<u64>,
}

impl Cli {
    fn layer(&self) -> SettingsLayer {
        SettingsLayer {
            listen_address: self.listen_address.clone(),
            metrics_path: self.metrics_path.clone(),
            site_path: self.site_path.clone(),
            timeout_seconds: self.timeout_seconds,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hadoop_exporter=info")))
        .init();

    let cli = Cli::parse();
    let file_layer = SettingsLayer::from_env().context("failed to load settings file")?;
    let settings = Settings::resolve(cli.daemon, file_layer.merge(cli.layer())).context("invalid settings")?;
    info!(
        daemon = %settings.daemon,
        site = %settings.site_path.display(),
        timeout_secs = settings.timeout.as_secs(),
        "starting hadoop exporter"
    );

    let site = SiteConfig::load(&settings.site_path)
        .with_context(|| format!("cannot load {}", settings.site_path.display()))?;
    let resolver: Arc<dyn HostResolver> = Arc::new(SystemResolver);
    let local = HostIdentity::local(resolver.as_ref()).context("cannot identify local host")?;
    let topology = resolve_topology(settings.daemon, &site, &local, resolver.as_ref())
        .context("cannot resolve service topology")?;

    let exporter = Exporter::new(settings.daemon, topology, resolver, settings.timeout)
        .context("failed to build HTTP client")?;
    let app = build_router(AppState::new(Arc::new(exporter), settings.metrics_path.clone()));

    let listener = TcpListener::bind(settings.listen_address)
        .await
        .with_context(|| format!("cannot bind {}", settings.listen_address))?;
    info!(
        address = %settings.listen_address,
        path = %settings.metrics_path,
        "serving metrics"
    );
    axum::serve(listener, app).await.context("metrics server stopped")?;
    Ok(())
}
