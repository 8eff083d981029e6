//! Flat view over a Hadoop `*-site.xml` property list.
//!
//! Lookups first try the exact property name and then fall back to the first
//! property whose name contains the requested key.

use std::path::Path;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteConfig {
    properties: Vec<(String, String)>,
}

impl SiteConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(xml: &str) -> Result<Self, ConfigError> {
        let doc = roxmltree::Document::parse(xml)?;
        let root = doc.root_element();
        if !root.has_tag_name("configuration") {
            return Err(ConfigError::Structure(format!(
                "root element is <{}>, expected <configuration>",
                root.tag_name().name()
            )));
        }

        let mut site = SiteConfig::default();
        for property in root.children().filter(|n| n.has_tag_name("property")) {
            let field = |tag: &str| {
                property
                    .children()
                    .find(|n| n.has_tag_name(tag))
                    .and_then(|n| n.text())
                    .map(|t| t.trim().to_string())
            };
            let Some(name) = field("name").filter(|n| !n.is_empty()) else {
                continue;
            };
            site.insert(name, field("value").unwrap_or_default());
        }
        Ok(site)
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut site = SiteConfig::default();
        for (k, v) in pairs {
            site.insert(k.into(), v.into());
        }
        site
    }

    /// Later definitions of the same name override earlier ones.
    pub fn insert(&mut self, name: String, value: String) {
        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.properties.push((name, value)),
        }
    }

    /// Non-empty value for `key`: exact name first, then containment.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.exact(key).or_else(|| {
            self.properties
                .iter()
                .find(|(name, value)| name.contains(key) && !value.is_empty())
                .map(|(_, value)| value.as_str())
        })
    }

    pub fn exact(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(name, value)| name == key && !value.is_empty())
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
