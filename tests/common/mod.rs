//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use pvcast::engine::clock::{SystemDateSource, TimestampSequence};
use pvcast::engine::pipeline::ForecastPipeline;
use pvcast::error::PlantNotFound;
use pvcast::plant::types::{ForecastResult, PlantRegistry, PvPlant, TimeSeries};

/// Wall-clock instant the fixture date source is frozen at.
pub fn pinned_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 21, 10, 0, 0).unwrap()
}

/// `2024-06-21T{hour}:00:00Z` as a request timestamp.
pub fn at(hour: u32) -> DateTime<FixedOffset> {
    Utc.with_ymd_and_hms(2024, 6, 21, hour, 0, 0)
        .unwrap()
        .fixed_offset()
}

/// Plant that returns fixed values for the first instants of any index.
///
/// Instants beyond the value lists are left out of the series, which makes
/// the plant's series shorter than the index.
#[derive(Debug, Clone)]
pub struct FixedPlant {
    pub name: String,
    pub power: Vec<f64>,
    pub energy: Vec<f64>,
    /// Extra instants appended after the index, one step apart.
    pub trailing: usize,
    pub delay: Option<Duration>,
}

impl FixedPlant {
    pub fn new(name: &str, power: &[f64], energy: &[f64]) -> Self {
        Self {
            name: name.to_string(),
            power: power.to_vec(),
            energy: energy.to_vec(),
            trailing: 0,
            delay: None,
        }
    }

    pub fn with_trailing(mut self, trailing: usize) -> Self {
        self.trailing = trailing;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn series(&self, timestamps: &TimestampSequence, values: &[f64]) -> TimeSeries {
        let mut index: Vec<DateTime<Tz>> = timestamps.iter().copied().collect();
        if let (Some(&last), Some(step)) = (index.last(), timestamps.step()) {
            index.extend((1..=self.trailing).map(|k| last + step * k as i32));
        }
        let n = index.len().min(values.len());
        index.truncate(n);
        TimeSeries::new(index, values[..n].to_vec())
    }
}

impl PvPlant for FixedPlant {
    fn name(&self) -> &str {
        &self.name
    }

    fn clearsky_forecast(&self, timestamps: &TimestampSequence) -> ForecastResult {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        ForecastResult {
            name: self.name.clone(),
            ac_power: self.series(timestamps, &self.power),
            ac_energy: self.series(timestamps, &self.energy),
        }
    }
}

/// In-memory registry. Names in `phantoms` are listed but fail lookup.
#[derive(Debug, Clone)]
pub struct FakeRegistry {
    pub plants: Vec<FixedPlant>,
    pub phantoms: Vec<String>,
    pub timezone: Tz,
}

impl FakeRegistry {
    pub fn new(plants: Vec<FixedPlant>) -> Self {
        Self {
            plants,
            phantoms: Vec::new(),
            timezone: Tz::UTC,
        }
    }

    pub fn with_phantom(mut self, name: &str) -> Self {
        self.phantoms.push(name.to_string());
        self
    }
}

impl PlantRegistry for FakeRegistry {
    fn plant_names(&self) -> Vec<String> {
        self.plants
            .iter()
            .map(|p| p.name.clone())
            .chain(self.phantoms.iter().cloned())
            .collect()
    }

    fn get(&self, name: &str) -> Result<&dyn PvPlant, PlantNotFound> {
        self.plants
            .iter()
            .find(|p| p.name == name)
            .map(|p| p as &dyn PvPlant)
            .ok_or_else(|| PlantNotFound(name.to_string()))
    }

    fn timezone(&self) -> Tz {
        self.timezone
    }
}

/// Pipeline over `registry` with the clock frozen at [`pinned_now`].
pub fn pipeline(registry: FakeRegistry, workers: usize) -> ForecastPipeline {
    ForecastPipeline::new(
        Arc::new(registry),
        Arc::new(SystemDateSource::pinned(pinned_now())),
        workers,
        TimeDelta::days(7),
    )
    .unwrap()
}

/// Two plants with two instants each: A `[100, 200]` W, B `[50, 150]` W.
pub fn two_plants() -> FakeRegistry {
    FakeRegistry::new(vec![
        FixedPlant::new("A", &[100.0, 200.0], &[100.4, 200.5]),
        FixedPlant::new("B", &[50.0, 150.0], &[50.5, 149.6]),
    ])
}
