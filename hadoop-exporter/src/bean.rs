use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ScrapeError;

/// Application states requested from the RM and kept after decoding.
pub const TRACKED_APP_STATES: [&str; 4] = ["RUNNING", "FINISHED", "FAILED", "KILLED"];

/// One JMX bean or one YARN application record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBean {
    fields: Map<String, Value>,
}

impl RawBean {
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.text("name")
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    /// `outer.inner` lookup, e.g. `HeapMemoryUsage.used`.
    pub fn nested_number(&self, outer: &str, inner: &str) -> Option<f64> {
        self.fields.get(outer)?.get(inner).and_then(Value::as_f64)
    }
}

/// Where the record list lives in a decoded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// `{"beans": [...]}` from `/jmx`.
    Beans,
    /// `{"apps": {"app": [...]}}` from the RM REST API, `{"apps": null}` when empty.
    Applications,
}

impl PayloadShape {
    pub fn decode(self, document: Value) -> Result<Vec<RawBean>, ScrapeError> {
        let Value::Object(mut root) = document else {
            return Err(ScrapeError::PayloadShape("document is not a JSON object".into()));
        };
        match self {
            PayloadShape::Beans => match root.remove("beans") {
                Some(Value::Array(items)) => Ok(objects(items)),
                Some(_) => Err(ScrapeError::PayloadShape("`beans` is not an array".into())),
                None => Err(ScrapeError::PayloadShape("missing `beans` array".into())),
            },
            PayloadShape::Applications => match root.remove("apps") {
                Some(Value::Null) => Ok(Vec::new()),
                Some(Value::Object(mut apps)) => match apps.remove("app") {
                    Some(Value::Array(items)) => Ok(objects(items)
                        .into_iter()
                        .filter(|app| app.text("state").is_some_and(|s| TRACKED_APP_STATES.contains(&s)))
                        .collect()),
                    _ => Err(ScrapeError::PayloadShape("missing `apps.app` array".into())),
                },
                Some(_) => Err(ScrapeError::PayloadShape("`apps` is not an object".into())),
                None => Err(ScrapeError::PayloadShape("missing `apps` key".into())),
            },
        }
    }
}

fn objects(items: Vec<Value>) -> Vec<RawBean> {
    let total = items.len();
    let beans: Vec<RawBean> = items.into_iter().filter_map(RawBean::from_value).collect();
    if beans.len() != total {
        debug!(skipped = total - beans.len(), "ignoring non-object records");
    }
    beans
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_flat_and_nested_fields() {
        let bean = RawBean::from_value(json!({
            "name": "java.lang:type=Memory",
            "HeapMemoryUsage": {"committed": 10, "used": 4.5},
            "Verbose": false
        }))
        .unwrap();
        assert_eq!(bean.name(), Some("java.lang:type=Memory"));
        assert_eq!(bean.nested_number("HeapMemoryUsage", "used"), Some(4.5));
        assert_eq!(bean.nested_number("HeapMemoryUsage", "max"), None);
        assert_eq!(bean.number("Verbose"), None);
        assert!(RawBean::from_value(json!([1, 2])).is_none());
    }

    #[test]
    fn decodes_bean_lists() {
        let beans = PayloadShape::Beans
            .decode(json!({"beans": [{"name": "a"}, 3, {"name": "b"}]}))
            .unwrap();
        assert_eq!(beans.len(), 2);
        assert!(matches!(
            PayloadShape::Beans.decode(json!({"items": []})),
            Err(ScrapeError::PayloadShape(_))
        ));
        assert!(PayloadShape::Beans.decode(json!("beans")).is_err());
    }

    #[test]
    fn null_apps_is_an_empty_list() {
        assert!(PayloadShape::Applications.decode(json!({"apps": null})).unwrap().is_empty());
    }

    #[test]
    fn filters_untracked_application_states() {
        let apps = PayloadShape::Applications
            .decode(json!({"apps": {"app": [
                {"id": "application_1_0001", "state": "RUNNING"},
                {"id": "application_1_0002", "state": "ACCEPTED"},
                {"id": "application_1_0003", "state": "KILLED"},
                {"id": "application_1_0004"}
            ]}}))
            .unwrap();
        let ids: Vec<_> = apps.iter().filter_map(|a| a.text("id")).collect();
        assert_eq!(ids, ["application_1_0001", "application_1_0003"]);
    }

    #[test]
    fn missing_app_array_is_a_shape_error() {
        assert!(matches!(
            PayloadShape::Applications.decode(json!({"apps": {}})),
            Err(ScrapeError::PayloadShape(_))
        ));
        assert!(PayloadShape::Applications.decode(json!({"beans": []})).is_err());
    }
}
