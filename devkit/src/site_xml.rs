/*!
Hadoop site-file fixtures

Builds `hdfs-site.xml` / `yarn-site.xml` documents and writes them to temporary
files that live as long as the returned handle.
*/

use anyhow::Result;
use std::io::Write;
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Default)]
pub struct SiteXml {
    properties: Vec<(String, String)>,
}

impl SiteXml {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((name.into(), value.into()));
        self
    }

    /// HA NameNode pair `ns.ids[i]` with RPC on 8020 and HTTP on the given addresses.
    pub fn namenode_ha(self, nameservice: &str, members: &[(&str, &str, &str)]) -> Self {
        let ids: Vec<&str> = members.iter().map(|(id, _, _)| *id).collect();
        let mut site = self
            .property("dfs.nameservices", nameservice)
            .property(format!("dfs.ha.namenodes.{nameservice}"), ids.join(","));
        for (id, rpc, http) in members {
            site = site
                .property(format!("dfs.namenode.rpc-address.{nameservice}.{id}"), *rpc)
                .property(format!("dfs.namenode.http-address.{nameservice}.{id}"), *http);
        }
        site
    }

    /// HA ResourceManager pair: `(id, hostname, webapp address)`.
    pub fn resourcemanager_ha(self, cluster_id: &str, members: &[(&str, &str, &str)]) -> Self {
        let ids: Vec<&str> = members.iter().map(|(id, _, _)| *id).collect();
        let mut site = self
            .property("yarn.resourcemanager.cluster-id", cluster_id)
            .property("yarn.resourcemanager.ha.enabled", "true")
            .property("yarn.resourcemanager.ha.rm-ids", ids.join(","));
        for (id, host, webapp) in members {
            site = site
                .property(format!("yarn.resourcemanager.hostname.{id}"), *host)
                .property(format!("yarn.resourcemanager.resource-tracker.address.{id}"), format!("{host}:8031"))
                .property(format!("yarn.resourcemanager.webapp.address.{id}"), *webapp);
        }
        site
    }

    pub fn render(&self) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <?xml-stylesheet type=\"text/xsl\" href=\"configuration.xsl\"?>\n\
             <configuration>\n",
        );
        for (name, value) in &self.properties {
            xml.push_str(&format!(
                "  <property>\n    <name>{}</name>\n    <value>{}</value>\n  </property>\n",
                escape(name),
                escape(value)
            ));
        }
        xml.push_str("</configuration>\n");
        xml
    }

    pub fn write_temp(&self) -> Result<NamedTempFile> {
        let mut file = tempfile::Builder::new().suffix("-site.xml").tempfile()?;
        file.write_all(self.render().as_bytes())?;
        file.flush()?;
        Ok(file)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_escaped_properties() {
        let xml = SiteXml::new().property("a&b", "<v>").render();
        assert!(xml.contains("<name>a&amp;b</name>"));
        assert!(xml.contains("<value>&lt;v&gt;</value>"));
        assert!(xml.trim_end().ends_with("</configuration>"));
    }

    #[test]
    fn writes_a_readable_file() {
        let file = SiteXml::new()
            .namenode_ha("ns1", &[("nn1", "a:8020", "a:9870"), ("nn2", "b:8020", "b:9870")])
            .write_temp()
            .unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        assert!(text.contains("<name>dfs.ha.namenodes.ns1</name>"));
        assert!(text.contains("<value>nn1,nn2</value>"));
    }
}
