//! Common types and traits for plants that can produce a clear-sky forecast.

use chrono::DateTime;
use chrono_tz::Tz;

use crate::engine::clock::{TimestampSequence, format_timestamp};
use crate::error::PlantNotFound;

/// A time series keyed by instants, as produced by a forecasting model.
///
/// Values are aligned one-to-one with `index`. A non-finite value marks an
/// undefined sample.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub index: Vec<DateTime<Tz>>,
    pub values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(index: Vec<DateTime<Tz>>, values: Vec<f64>) -> Self {
        Self { index, values }
    }

    pub fn len(&self) -> usize {
        self.index.len().min(self.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts the instants to response labels.
    pub fn to_labelled(&self) -> Series {
        Series {
            labels: self.index.iter().map(format_timestamp).collect(),
            values: self.values.iter().take(self.index.len()).copied().collect(),
        }
    }
}

/// A time series keyed by display labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl Series {
    pub fn new(labels: Vec<String>, values: Vec<f64>) -> Self {
        Self { labels, values }
    }

    pub fn len(&self) -> usize {
        self.labels.len().min(self.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(label, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub fn first_label(&self) -> Option<&str> {
        self.labels.first().map(String::as_str)
    }

    pub fn last_label(&self) -> Option<&str> {
        self.labels.last().map(String::as_str)
    }
}

/// Output of a clear-sky forecast for one plant.
///
/// # Fields
/// * `ac_power` - AC power in W at each instant
/// * `ac_energy` - AC energy in Wh produced during the interval starting at each instant
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastResult {
    pub name: String,
    pub ac_power: TimeSeries,
    pub ac_energy: TimeSeries,
}

/// A PV plant that can estimate its output under clear-sky conditions.
///
/// Implementations must be pure functions of the timestamp sequence so that
/// plants can be forecast concurrently.
pub trait PvPlant: Send + Sync {
    /// Unique plant name.
    fn name(&self) -> &str;

    /// Estimates AC power and energy at every instant of `timestamps`.
    fn clearsky_forecast(&self, timestamps: &TimestampSequence) -> ForecastResult;
}

/// Lookup of plants by name.
pub trait PlantRegistry: Send + Sync {
    /// Names of all plants, in configuration order.
    fn plant_names(&self) -> Vec<String>;

    /// Looks up a plant.
    ///
    /// # Errors
    ///
    /// Returns [`PlantNotFound`] if no plant has this name.
    fn get(&self, name: &str) -> Result<&dyn PvPlant, PlantNotFound>;

    /// IANA timezone of the plants' location.
    fn timezone(&self) -> Tz;
}
