//! Open record of everything a fit wants to report.
//!
//! Any component may add entries under new keys; nothing here knows which keys exist. Entries keep
//! their insertion order, which is also the order of the JSON rendering.

use serde::ser::{Serialize, SerializeMap, Serializer};

#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Scalar::Int(v) => Some(v as f64),
            Scalar::Float(v) => Some(v),
            Scalar::Text(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Scalar::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for Scalar { fn from(v: i64) -> Self { Scalar::Int(v) } }
impl From<u64> for Scalar {
    fn from(v: u64) -> Self {
        i64::try_from(v).map(Scalar::Int).unwrap_or(Scalar::Float(v as f64))
    }
}
impl From<usize> for Scalar { fn from(v: usize) -> Self { Scalar::Int(v as i64) } }
impl From<bool> for Scalar { fn from(v: bool) -> Self { Scalar::Int(v as i64) } }
impl From<f64> for Scalar { fn from(v: f64) -> Self { Scalar::Float(v) } }
impl From<f32> for Scalar { fn from(v: f32) -> Self { Scalar::Float(v as f64) } }
impl From<&str> for Scalar { fn from(v: &str) -> Self { Scalar::Text(v.to_string()) } }
impl From<String> for Scalar { fn from(v: String) -> Self { Scalar::Text(v) } }

#[derive(Clone, Debug, PartialEq)]
pub enum MetricValue {
    Scalar(Scalar),
    Sequence(Vec<Scalar>),
    Record(MetricsRecord),
}

macro_rules! impl_scalar_values {
    ($($t:ty),*) => {$(
        impl From<$t> for MetricValue {
            fn from(v: $t) -> Self { MetricValue::Scalar(v.into()) }
        }
    )*};
}
impl_scalar_values!(i64, u64, usize, bool, f64, f32, &str, String);

impl From<Scalar> for MetricValue {
    fn from(v: Scalar) -> Self { MetricValue::Scalar(v) }
}
impl From<MetricsRecord> for MetricValue {
    fn from(v: MetricsRecord) -> Self { MetricValue::Record(v) }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricsRecord {
    entries: Vec<(String, MetricValue)>,
}

impl MetricsRecord {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut MetricValue> {
        self.entries.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool { self.get(key).is_some() }

    /// Set `key`, replacing a previous value in place or appending a new entry.
    pub fn set(&mut self, key: &str, value: impl Into<MetricValue>) -> &mut Self {
        let value = value.into();
        match self.get_mut(key) {
            Some(slot) => *slot = value,
            None => self.entries.push((key.to_string(), value)),
        }
        self
    }

    /// Append to the sequence stored under `key`, starting one if needed.
    pub fn push(&mut self, key: &str, value: impl Into<Scalar>) -> &mut Self {
        let value = value.into();
        match self.get_mut(key) {
            Some(MetricValue::Sequence(seq)) => seq.push(value),
            Some(slot) => *slot = MetricValue::Sequence(vec![value]),
            None => self.entries.push((key.to_string(), MetricValue::Sequence(vec![value]))),
        }
        self
    }

    /// Make sure a sequence exists under `key`, even if nothing gets pushed.
    pub fn ensure_sequence(&mut self, key: &str) -> &mut Self {
        if !matches!(self.get(key), Some(MetricValue::Sequence(_))) {
            self.set_value(key, MetricValue::Sequence(Vec::new()));
        }
        self
    }

    fn set_value(&mut self, key: &str, value: MetricValue) {
        match self.get_mut(key) {
            Some(slot) => *slot = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// Nested record under `key`, created empty on first access.
    pub fn record_mut(&mut self, key: &str) -> &mut MetricsRecord {
        if !matches!(self.get(key), Some(MetricValue::Record(_))) {
            self.set_value(key, MetricValue::Record(MetricsRecord::new()));
        }
        match self.get_mut(key) {
            Some(MetricValue::Record(r)) => r,
            _ => unreachable!("record inserted above"),
        }
    }

    pub fn record(&self, key: &str) -> Option<&MetricsRecord> {
        match self.get(key) {
            Some(MetricValue::Record(r)) => Some(r),
            _ => None,
        }
    }

    pub fn scalar(&self, key: &str) -> Option<&Scalar> {
        match self.get(key) {
            Some(MetricValue::Scalar(s)) => Some(s),
            _ => None,
        }
    }

    pub fn sequence(&self, key: &str) -> Option<&[Scalar]> {
        match self.get(key) {
            Some(MetricValue::Sequence(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> { self.scalar(key).and_then(Scalar::as_f64) }
    pub fn get_i64(&self, key: &str) -> Option<i64> { self.scalar(key).and_then(Scalar::as_i64) }
    pub fn get_str(&self, key: &str) -> Option<&str> { self.scalar(key).and_then(Scalar::as_str) }

    /// Numeric sequence under `key`; non-numeric members are skipped.
    pub fn sequence_f64(&self, key: &str) -> Vec<f64> {
        self.sequence(key).map(|s| s.iter().filter_map(Scalar::as_f64).collect()).unwrap_or_default()
    }

    pub fn sequence_i64(&self, key: &str) -> Vec<i64> {
        self.sequence(key).map(|s| s.iter().filter_map(Scalar::as_i64).collect()).unwrap_or_default()
    }

    /// Read a number from the nested record `section`, recording `default` there when absent,
    /// so the final record shows every value a run actually used.
    pub fn f64_or_default(&mut self, section: &str, key: &str, default: f64) -> f64 {
        let record = self.record_mut(section);
        match record.get_f64(key) {
            Some(v) => v,
            None => {
                record.set(key, default);
                default
            },
        }
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_string_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Int(v) => serializer.serialize_i64(*v),
            Scalar::Float(v) => serializer.serialize_f64(*v),
            Scalar::Text(v) => serializer.serialize_str(v),
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Scalar(v) => v.serialize(serializer),
            MetricValue::Sequence(v) => v.serialize(serializer),
            MetricValue::Record(v) => v.serialize(serializer),
        }
    }
}

impl Serialize for MetricsRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_keys_keep_insertion_order() {
        let mut record = MetricsRecord::new();
        record.set("no_clusters", 4usize).set("algorithm", "elkan").set("tol", 1e-6);
        record.push("iteration_changes", 3usize).push("iteration_changes", 0usize);
        record.record_mut("block_vector_data").set("dim", 12usize);
        record.set("no_clusters", 3usize);

        assert_eq!(record.keys().collect::<Vec<_>>(),
                   vec!["no_clusters", "algorithm", "tol", "iteration_changes", "block_vector_data"]);
        assert_eq!(record.get_i64("no_clusters"), Some(3));
        assert_eq!(record.get_str("algorithm"), Some("elkan"));
        assert_eq!(record.sequence_i64("iteration_changes"), vec![3, 0]);
        assert_eq!(record.record("block_vector_data").and_then(|r| r.get_i64("dim")), Some(12));
        assert!(record.sequence("missing").is_none());
    }

    #[test]
    fn defaults_are_recorded() {
        let mut record = MetricsRecord::new();
        record.record_mut("additional_params").set("bv_annz", 0.5);
        assert_eq!(record.f64_or_default("additional_params", "bv_annz", 0.3), 0.5);
        assert_eq!(record.f64_or_default("additional_params", "yinyang_regroup_interval", 20.0), 20.0);
        let params = record.record("additional_params").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params.get_f64("yinyang_regroup_interval"), Some(20.0));
    }

    #[test]
    fn renders_json_in_order() {
        let mut record = MetricsRecord::new();
        record.set("b", 1usize).set("a", "x");
        record.ensure_sequence("empty");
        record.push("wcssd", 2.5).push("wcssd", 1.0);
        record.record_mut("info").set("dataset", "news");
        assert_eq!(record.to_json_string().unwrap(),
                   r#"{"b":1,"a":"x","empty":[],"wcssd":[2.5,1.0],"info":{"dataset":"news"}}"#);
    }
}
