//! Plant registry built from the TOML configuration.

use chrono_tz::Tz;

use super::solar::{ClearskyPlant, Location, PvArray};
use super::types::{PlantRegistry, PvPlant};
use crate::config::{ConfigError, PvcastConfig};
use crate::error::PlantNotFound;

/// Registry of clear-sky plants sharing one location, in configuration order.
#[derive(Debug, Clone)]
pub struct ConfiguredRegistry {
    plants: Vec<ClearskyPlant>,
    timezone: Tz,
}

impl ConfiguredRegistry {
    pub fn new(plants: Vec<ClearskyPlant>, timezone: Tz) -> Self {
        Self { plants, timezone }
    }

    /// Builds one [`ClearskyPlant`] per `[[plant]]` section.
    ///
    /// # Errors
    ///
    /// Returns every validation error of `config`, or the timezone error if
    /// validation passed but the timezone still fails to parse.
    pub fn from_config(config: &PvcastConfig) -> Result<Self, Vec<ConfigError>> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(errors);
        }
        let timezone = config.timezone().map_err(|e| vec![e])?;

        let loc = &config.general.location;
        let location = Location {
            latitude: loc.latitude,
            longitude: loc.longitude,
            altitude: loc.altitude,
        };

        let plants = config
            .plants
            .iter()
            .map(|p| {
                let arrays = p
                    .arrays
                    .iter()
                    .map(|a| PvArray {
                        name: a.name.clone(),
                        tilt_deg: a.tilt,
                        azimuth_deg: a.azimuth,
                        dc_capacity_w: a.dc_capacity_w(),
                        temp_coeff: a.temp_coeff,
                    })
                    .collect();
                ClearskyPlant::new(
                    p.name.clone(),
                    location,
                    arrays,
                    p.inverter_efficiency,
                    p.ac_limit_w,
                    p.microinverter,
                )
            })
            .collect();

        Ok(Self::new(plants, timezone))
    }
}

impl PlantRegistry for ConfiguredRegistry {
    fn plant_names(&self) -> Vec<String> {
        self.plants.iter().map(|p| p.name().to_string()).collect()
    }

    fn get(&self, name: &str) -> Result<&dyn PvPlant, PlantNotFound> {
        self.plants
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p as &dyn PvPlant)
            .ok_or_else(|| PlantNotFound(name.to_string()))
    }

    fn timezone(&self) -> Tz {
        self.timezone
    }
}
