//! Nested `metric -> plant -> timestamp -> value` view of a quantized table.
//!
//! Maps are kept as vectors so that serialization follows schema order
//! instead of hash or key order.

use serde::ser::{Serialize, SerializeMap, Serializer};

use super::validate::QuantizedTable;

type TimestampValues = Vec<(String, i64)>;
type PlantValues = Vec<(String, TimestampValues)>;

/// Ordered three-level mapping serialized as nested JSON objects.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NestedResult {
    metrics: Vec<(String, PlantValues)>,
}

impl NestedResult {
    /// Metric names in order.
    pub fn metrics(&self) -> Vec<&str> {
        self.metrics.iter().map(|(m, _)| m.as_str()).collect()
    }

    /// Plant names under `metric`, in order.
    pub fn plants(&self, metric: &str) -> Vec<&str> {
        self.plant_values(metric)
            .map(|plants| plants.iter().map(|(p, _)| p.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn get(&self, metric: &str, plant: &str, timestamp: &str) -> Option<i64> {
        self.plant_values(metric)?
            .iter()
            .find(|(p, _)| p == plant)?
            .1
            .iter()
            .find(|(ts, _)| ts == timestamp)
            .map(|(_, v)| *v)
    }

    fn plant_values(&self, metric: &str) -> Option<&PlantValues> {
        self.metrics
            .iter()
            .find(|(m, _)| m == metric)
            .map(|(_, plants)| plants)
    }
}

/// Groups columns by metric in first-appearance order.
pub fn to_nested(table: &QuantizedTable) -> NestedResult {
    let mut metrics: Vec<(String, PlantValues)> = Vec::new();

    for key in table.columns() {
        let cells = table.column(key.metric, &key.plant).unwrap_or_default();
        let values: TimestampValues = table
            .index()
            .iter()
            .cloned()
            .zip(cells.iter().copied())
            .collect();

        let metric = key.metric.as_str();
        let plant = (key.plant.to_string(), values);
        match metrics.iter_mut().find(|(m, _)| m == metric) {
            Some((_, plants)) => plants.push(plant),
            None => metrics.push((metric.to_string(), vec![plant])),
        }
    }

    NestedResult { metrics }
}

impl Serialize for NestedResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.metrics.len()))?;
        for (metric, plants) in &self.metrics {
            map.serialize_entry(metric, &PlantMap(plants))?;
        }
        map.end()
    }
}

struct PlantMap<'a>(&'a PlantValues);

impl Serialize for PlantMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (plant, values) in self.0 {
            map.serialize_entry(plant, &TimestampMap(values))?;
        }
        map.end()
    }
}

struct TimestampMap<'a>(&'a TimestampValues);

impl Serialize for TimestampMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (timestamp, value) in self.0 {
            map.serialize_entry(timestamp, value)?;
        }
        map.end()
    }
}
