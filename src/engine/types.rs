//! Column keys, requests and the response envelope.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use super::clock::Interval;
use super::nested::NestedResult;

/// Request path value that selects every configured plant.
pub const ALL_PLANTS: &str = "all";

/// Column name of the cross-plant aggregate.
pub const TOTAL_PLANT: &str = "Total";

/// Quantity stored in a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// AC power (W).
    Watt,
    /// AC energy per interval (Wh).
    WattHours,
    /// Running sum of `WattHours` since the first instant (Wh).
    WattHoursCumsum,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Watt => "watt",
            Self::WattHours => "watt_hours",
            Self::WattHoursCumsum => "watt_hours_cumsum",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Second half of a column key: a named plant or the aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlantKey {
    Named(String),
    Total,
}

impl PlantKey {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Total => TOTAL_PLANT,
        }
    }
}

impl fmt::Display for PlantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(metric, plant)` pair identifying one table column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnKey {
    pub metric: Metric,
    pub plant: PlantKey,
}

impl ColumnKey {
    pub fn new(metric: Metric, plant: PlantKey) -> Self {
        Self { metric, plant }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.metric, self.plant)
    }
}

/// A clear-sky forecast request for one plant or for `all`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClearskyRequest {
    pub plant_name: String,
    pub interval: Interval,
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
}

impl ClearskyRequest {
    /// A request over the default window (`now` to `now + interval`).
    pub fn new(plant_name: impl Into<String>, interval: Interval) -> Self {
        Self {
            plant_name: plant_name.into(),
            interval,
            start: None,
            end: None,
        }
    }

    /// Sets an explicit window.
    pub fn with_window(mut self, start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Whether the request targets every plant.
    pub fn is_all(&self) -> bool {
        self.plant_name.eq_ignore_ascii_case(ALL_PLANTS)
    }
}

/// Final response: window metadata plus the nested result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    pub interval: Interval,
    pub start: String,
    pub end: String,
    pub timezone: String,
    pub result: NestedResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_key_displays_as_metric_slash_plant() {
        let key = ColumnKey::new(Metric::WattHoursCumsum, PlantKey::named("Roof"));
        assert_eq!(key.to_string(), "watt_hours_cumsum/Roof");
        let total = ColumnKey::new(Metric::Watt, PlantKey::Total);
        assert_eq!(total.to_string(), "watt/Total");
    }

    #[test]
    fn all_is_case_insensitive() {
        assert!(ClearskyRequest::new("ALL", Interval::OneHour).is_all());
        assert!(ClearskyRequest::new("All", Interval::OneHour).is_all());
        assert!(!ClearskyRequest::new("allotment", Interval::OneHour).is_all());
    }
}
