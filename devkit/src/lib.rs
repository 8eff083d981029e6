/*!
# Hadoop Exporter DevKit - stubs and fixtures for tests

Lets the exporter be exercised without a Hadoop cluster:
- Stub introspection daemons answering `/jmx` and `/ws/v1/cluster/apps`
- Payload builders for bean lists and application listings
- Site-file fixtures written to temporary files
*/

pub mod jmx_stub;
pub mod payloads;
pub mod site_xml;

pub use jmx_stub::{StubBehavior, StubDaemon};
pub use payloads::{app_record, AppsPayload, JmxPayload};
pub use site_xml::SiteXml;

/// Logging for test binaries; repeated calls are harmless. Exporter `tracing`
/// events show up here through `tracing`'s `log` feature.
pub fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}
