use std::collections::HashMap;

use serde::Serialize;

use crate::registry::{AttributeDescriptor, AttributeRegistry, Scale};

/// A collected value for one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StatusValue {
    Int(i64),
    Str(String),
}

impl StatusValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            Self::Int(_) => None,
        }
    }
}

/// Per-metric values keyed by object name for the current cycle.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct MetricStore {
    metrics: HashMap<&'static str, HashMap<String, StatusValue>>,
}

impl MetricStore {
    pub fn new(registry: &AttributeRegistry) -> Self {
        let mut store = Self::default();
        store.reset_cycle(registry);
        store
    }

    /// Start a new cycle: every registered metric gets an empty map, so
    /// objects that are no longer reported leave nothing behind.
    pub fn reset_cycle(&mut self, registry: &AttributeRegistry) {
        self.metrics = registry
            .names()
            .map(|name| (name, HashMap::new()))
            .collect();
    }

    /// Record a value. A later write for the same metric and key replaces
    /// the earlier one.
    pub fn write(&mut self, metric: &'static str, key: &str, value: StatusValue) {
        self.metrics
            .entry(metric)
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn values(&self, metric: &str) -> Option<&HashMap<String, StatusValue>> {
        self.metrics.get(metric)
    }

    pub fn get(&self, metric: &str, key: &str) -> Option<&StatusValue> {
        self.metrics.get(metric)?.get(key)
    }

    /// Number of distinct objects with a name entry this cycle.
    pub fn object_count(&self) -> usize {
        self.metrics
            .get(crate::registry::ATTR_Q_NAME)
            .map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.values().all(HashMap::is_empty)
    }
}

/// Convert a raw integer into its exported form.
///
/// Negative values are the queue manager's "not available" markers and are
/// returned unscaled.
pub fn normalize(descriptor: &AttributeDescriptor, raw: i64) -> f64 {
    let v = raw as f64;
    if raw < 0 {
        return v;
    }
    match descriptor.scale {
        Scale::Identity => v,
        Scale::MicrosToSeconds => v / 1_000_000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{
        Capabilities, ATTR_Q_DEPTH, ATTR_Q_MSGAGE, ATTR_Q_NAME, ATTR_Q_QTIME_SHORT,
    };

    fn registry() -> AttributeRegistry {
        AttributeRegistry::new(&Capabilities::default())
    }

    #[test]
    fn test_reset_cycle_empties_every_metric() {
        let reg = registry();
        let mut store = MetricStore::new(&reg);
        store.write(ATTR_Q_DEPTH, "Q1", StatusValue::Int(3));
        store.write(ATTR_Q_NAME, "Q1", StatusValue::Str("Q1".into()));

        store.reset_cycle(&reg);

        for name in reg.names() {
            assert!(store.values(name).is_some_and(HashMap::is_empty), "{name}");
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_last_write_wins() {
        let mut store = MetricStore::new(&registry());
        store.write(ATTR_Q_DEPTH, "Q1", StatusValue::Int(3));
        store.write(ATTR_Q_DEPTH, "Q1", StatusValue::Int(8));
        assert_eq!(store.get(ATTR_Q_DEPTH, "Q1"), Some(&StatusValue::Int(8)));
        assert_eq!(store.values(ATTR_Q_DEPTH).map(HashMap::len), Some(1));
    }

    #[test]
    fn test_object_count_follows_name_metric() {
        let mut store = MetricStore::new(&registry());
        assert_eq!(store.object_count(), 0);
        store.write(ATTR_Q_NAME, "Q1", StatusValue::Str("Q1".into()));
        store.write(ATTR_Q_NAME, "Q2", StatusValue::Str("Q2".into()));
        assert_eq!(store.object_count(), 2);
    }

    #[test]
    fn test_normalize_is_table_driven() {
        let reg = registry();
        let qtime = reg.get(ATTR_Q_QTIME_SHORT).unwrap();
        let age = reg.get(ATTR_Q_MSGAGE).unwrap();

        assert_eq!(normalize(qtime, 2_500_000), 2.5);
        assert_eq!(normalize(age, 42), 42.0);
    }

    #[test]
    fn test_normalize_keeps_unavailable_marker() {
        let reg = registry();
        let qtime = reg.get(ATTR_Q_QTIME_SHORT).unwrap();
        assert_eq!(normalize(qtime, -1), -1.0);
    }

    #[test]
    fn test_values_serialize_untagged() {
        let mut store = MetricStore::default();
        store.write(ATTR_Q_DEPTH, "Q1", StatusValue::Int(5));
        let json = serde_json::to_string(&store).unwrap();
        assert_eq!(json, r#"{"depth":{"Q1":5}}"#);
    }
}
