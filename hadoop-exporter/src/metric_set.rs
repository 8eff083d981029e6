use std::collections::hash_map::Entry;
use std::collections::HashMap;

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use crate::catalog::MetricDefinition;

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub help: String,
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

impl Sample {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}

/// Samples from a single scrape cycle. Built, rendered, dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSet {
    samples: Vec<Sample>,
}

impl MetricSet {
    /// `values` pairs up with `definition.label_names` by position.
    pub fn push<S: AsRef<str>>(&mut self, definition: &MetricDefinition, values: &[S], value: f64) {
        let labels = definition
            .label_names
            .iter()
            .zip(values.iter().map(AsRef::as_ref).chain(std::iter::repeat("")))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        self.samples.push(Sample {
            name: definition.name.clone(),
            help: definition.help.clone(),
            labels,
            value,
        });
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// First sample value under `name`.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.samples.iter().find(|s| s.name == name).map(|s| s.value)
    }

    pub fn value_where(&self, name: &str, label: &str, label_value: &str) -> Option<f64> {
        self.samples
            .iter()
            .find(|s| s.name == name && s.label(label) == Some(label_value))
            .map(|s| s.value)
    }

    pub fn count(&self, name: &str) -> usize {
        self.samples.iter().filter(|s| s.name == name).count()
    }

    /// Prometheus text exposition of this set, through a throwaway registry.
    pub fn render(&self) -> prometheus::Result<String> {
        let registry = Registry::new();
        let mut families: HashMap<&str, GaugeVec> = HashMap::new();

        for sample in &self.samples {
            let gauge = match families.entry(sample.name.as_str()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let names: Vec<&str> = sample.labels.iter().map(|(k, _)| k.as_str()).collect();
                    let vec = GaugeVec::new(Opts::new(sample.name.as_str(), sample.help.as_str()), &names)?;
                    registry.register(Box::new(vec.clone()))?;
                    entry.insert(vec)
                }
            };
            let values: Vec<&str> = sample.labels.iter().map(|(_, v)| v.as_str()).collect();
            gauge.get_metric_with_label_values(&values)?.set(sample.value);
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
