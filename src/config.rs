//! TOML-based configuration: location, forecast limits, server and PV plants.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::TimeDelta;
use chrono_tz::Tz;
use serde::Deserialize;
use thiserror::Error;

use crate::engine::types::{ALL_PLANTS, TOTAL_PLANT};

/// Top-level configuration parsed from TOML.
///
/// Every section except the plant list has defaults. Load from TOML with
/// [`PvcastConfig::from_toml_file`] or use [`PvcastConfig::demo`] for the
/// built-in two-plant setup.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PvcastConfig {
    /// Location and forecast limits.
    #[serde(default)]
    pub general: GeneralConfig,
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// PV plants, in the order they appear in responses.
    #[serde(default, rename = "plant")]
    pub plants: Vec<PlantConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralConfig {
    pub location: LocationConfig,
    pub forecast: ForecastConfig,
}

/// Site coordinates shared by all plants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocationConfig {
    /// Latitude in degrees (-90..=90).
    pub latitude: f64,
    /// Longitude in degrees (-180..=180).
    pub longitude: f64,
    /// Altitude in metres (-500..=9000); thins the clear-sky air mass.
    pub altitude: f64,
    /// IANA timezone name, e.g. `"Europe/Amsterdam"`.
    pub timezone: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: 52.3676,
            longitude: 4.9041,
            altitude: 0.0,
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForecastConfig {
    /// Longest explicit request window, in days (must be > 0).
    pub max_forecast_days: u32,
    /// Forecast worker threads; 0 uses the available parallelism.
    pub workers: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            max_forecast_days: 7,
            workers: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub port: u16,
    /// Deadline for one whole request pipeline, in seconds (must be > 0).
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4557,
            request_timeout_secs: 30,
        }
    }
}

/// One PV plant: an inverter with one or more arrays.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlantConfig {
    /// Unique plant name, used in request paths and responses.
    pub name: String,
    /// DC to AC efficiency (0.0, 1.0].
    #[serde(default = "default_inverter_efficiency")]
    pub inverter_efficiency: f64,
    /// Inverter AC power limit (W); unlimited when absent.
    #[serde(default)]
    pub ac_limit_w: Option<f64>,
    /// One microinverter per array; the AC limit then applies per array.
    #[serde(default)]
    pub microinverter: bool,
    pub arrays: Vec<ArrayConfig>,
}

fn default_inverter_efficiency() -> f64 {
    0.96
}

/// A fixed-mount array of identical modules.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArrayConfig {
    pub name: String,
    /// Tilt from horizontal (degrees, 0..=90).
    pub tilt: f64,
    /// Azimuth clockwise from north (degrees, 0..=360; 180 = south).
    pub azimuth: f64,
    pub modules_per_string: u32,
    pub strings: u32,
    /// Module power at STC (W).
    pub module_power_w: f64,
    /// Power temperature coefficient (1/°C).
    #[serde(default = "default_temp_coeff")]
    pub temp_coeff: f64,
}

fn default_temp_coeff() -> f64 {
    -0.004
}

impl ArrayConfig {
    /// Installed DC capacity (W).
    pub fn dc_capacity_w(&self) -> f64 {
        f64::from(self.modules_per_string) * f64::from(self.strings) * self.module_power_w
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"plant[0].arrays[1].tilt"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl PvcastConfig {
    /// Built-in configuration with two plants in Amsterdam.
    pub fn demo() -> Self {
        Self {
            general: GeneralConfig {
                location: LocationConfig {
                    timezone: "Europe/Amsterdam".to_string(),
                    ..LocationConfig::default()
                },
                forecast: ForecastConfig::default(),
            },
            server: ServerConfig::default(),
            plants: vec![
                PlantConfig {
                    name: "EastWest".to_string(),
                    inverter_efficiency: 0.96,
                    ac_limit_w: Some(5000.0),
                    microinverter: false,
                    arrays: vec![
                        array("East", 30.0, 90.0, 8, 1, 330.0),
                        array("West", 30.0, 270.0, 8, 1, 330.0),
                    ],
                },
                PlantConfig {
                    name: "South".to_string(),
                    inverter_efficiency: 0.95,
                    ac_limit_w: Some(400.0),
                    microinverter: true,
                    arrays: vec![array("South", 35.0, 180.0, 6, 2, 400.0)],
                },
            ],
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Parsed location timezone.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the name is not a known IANA timezone.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        let name = &self.general.location.timezone;
        name.parse::<Tz>()
            .map_err(|_| ConfigError::new("general.location.timezone", format!("unknown timezone \"{name}\"")))
    }

    /// Longest explicit request window.
    pub fn max_window(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.general.forecast.max_forecast_days))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let loc = &self.general.location;
        if !(-90.0..=90.0).contains(&loc.latitude) {
            errors.push(ConfigError::new("general.location.latitude", "must be in [-90, 90]"));
        }
        if !(-180.0..=180.0).contains(&loc.longitude) {
            errors.push(ConfigError::new("general.location.longitude", "must be in [-180, 180]"));
        }
        if !(-500.0..=9000.0).contains(&loc.altitude) {
            errors.push(ConfigError::new("general.location.altitude", "must be in [-500, 9000]"));
        }
        if let Err(e) = self.timezone() {
            errors.push(e);
        }

        if self.general.forecast.max_forecast_days == 0 {
            errors.push(ConfigError::new("general.forecast.max_forecast_days", "must be > 0"));
        }
        if self.server.request_timeout_secs == 0 {
            errors.push(ConfigError::new("server.request_timeout_secs", "must be > 0"));
        }

        if self.plants.is_empty() {
            errors.push(ConfigError::new("plant", "at least one plant must be configured"));
        }

        let mut seen = HashSet::new();
        for (i, plant) in self.plants.iter().enumerate() {
            let path = format!("plant[{i}]");
            if plant.name.trim().is_empty() {
                errors.push(ConfigError::new(format!("{path}.name"), "must not be empty"));
            }
            if plant.name.eq_ignore_ascii_case(ALL_PLANTS) || plant.name == TOTAL_PLANT {
                errors.push(ConfigError::new(
                    format!("{path}.name"),
                    format!("\"{}\" is reserved", plant.name),
                ));
            }
            if !seen.insert(plant.name.as_str()) {
                errors.push(ConfigError::new(
                    format!("{path}.name"),
                    format!("duplicate plant name \"{}\"", plant.name),
                ));
            }
            if !(plant.inverter_efficiency > 0.0 && plant.inverter_efficiency <= 1.0) {
                errors.push(ConfigError::new(
                    format!("{path}.inverter_efficiency"),
                    "must be in (0.0, 1.0]",
                ));
            }
            if plant.ac_limit_w.is_some_and(|w| w <= 0.0) {
                errors.push(ConfigError::new(format!("{path}.ac_limit_w"), "must be > 0"));
            }
            if plant.arrays.is_empty() {
                errors.push(ConfigError::new(format!("{path}.arrays"), "must not be empty"));
            }

            for (j, arr) in plant.arrays.iter().enumerate() {
                let apath = format!("{path}.arrays[{j}]");
                if !(0.0..=90.0).contains(&arr.tilt) {
                    errors.push(ConfigError::new(format!("{apath}.tilt"), "must be in [0, 90]"));
                }
                if !(0.0..=360.0).contains(&arr.azimuth) {
                    errors.push(ConfigError::new(format!("{apath}.azimuth"), "must be in [0, 360]"));
                }
                if arr.modules_per_string == 0 || arr.strings == 0 {
                    errors.push(ConfigError::new(
                        format!("{apath}.strings"),
                        "modules_per_string and strings must be > 0",
                    ));
                }
                if arr.module_power_w <= 0.0 {
                    errors.push(ConfigError::new(format!("{apath}.module_power_w"), "must be > 0"));
                }
            }
        }

        errors
    }
}

fn array(name: &str, tilt: f64, azimuth: f64, modules: u32, strings: u32, watt: f64) -> ArrayConfig {
    ArrayConfig {
        name: name.to_string(),
        tilt,
        azimuth,
        modules_per_string: modules,
        strings,
        module_power_w: watt,
        temp_coeff: default_temp_coeff(),
    }
}
