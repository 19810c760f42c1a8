//! Clear-sky PV plant model.
//!
//! Pipeline per instant:
//!  1. Solar geometry: declination and equation of time (Spencer 1971),
//!     hour angle, zenith and azimuth
//!  2. Extraterrestrial irradiance with eccentricity correction
//!  3. Clear-sky GHI (Haurwitz 1945) with its extinction term scaled by the
//!     site's barometric pressure, split into DNI/DHI with the Erbs correlation
//!  4. Plane-of-array irradiance per array (isotropic sky, ground albedo)
//!  5. Cell temperature from a NOCT model at a fixed clear-sky ambient
//!  6. DC power with temperature coefficient, AC via inverter efficiency and clipping

use std::f64::consts::PI;

use chrono::{DateTime, Datelike, Timelike};
use chrono_tz::Tz;

use super::types::{ForecastResult, PvPlant, TimeSeries};
use crate::engine::clock::TimestampSequence;

const SOLAR_CONSTANT_W_M2: f64 = 1361.0;
const DEG: f64 = PI / 180.0;
const ALBEDO: f64 = 0.2;
const NOCT_C: f64 = 45.0;
const CLEARSKY_AMBIENT_C: f64 = 20.0;

/// Geographic position shared by all plants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Metres above sea level; lowers the air mass the sunlight crosses.
    pub altitude: f64,
}

/// One fixed-mount PV array of a plant.
#[derive(Debug, Clone, PartialEq)]
pub struct PvArray {
    pub name: String,
    /// Surface tilt from horizontal (degrees).
    pub tilt_deg: f64,
    /// Surface azimuth, clockwise from north (degrees; 180 = south).
    pub azimuth_deg: f64,
    /// DC capacity at standard test conditions (W).
    pub dc_capacity_w: f64,
    /// Power temperature coefficient (1/°C, e.g. -0.004).
    pub temp_coeff: f64,
}

/// Sun position for one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarPosition {
    /// Cosine of the solar zenith angle (negative below the horizon).
    pub cos_zenith: f64,
    /// Solar azimuth clockwise from north (degrees).
    pub azimuth_deg: f64,
    /// Eccentricity-corrected extraterrestrial irradiance (W/m²).
    pub extra_w_m2: f64,
}

/// Clear-sky irradiance components on the horizontal plane (W/m²).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Irradiance {
    pub ghi: f64,
    pub dni: f64,
    pub dhi: f64,
}

/// A PV plant forecast with a deterministic clear-sky model.
///
/// With `microinverter` set, the AC limit applies to each array separately
/// instead of to the plant total.
#[derive(Debug, Clone)]
pub struct ClearskyPlant {
    name: String,
    location: Location,
    arrays: Vec<PvArray>,
    inverter_efficiency: f64,
    ac_limit_w: Option<f64>,
    microinverter: bool,
}

impl ClearskyPlant {
    /// Creates a new clear-sky plant.
    ///
    /// # Arguments
    ///
    /// * `name` - Unique plant name
    /// * `location` - Site coordinates
    /// * `arrays` - Fixed-mount arrays making up the plant
    /// * `inverter_efficiency` - DC to AC conversion efficiency (clamped to 0..=1)
    /// * `ac_limit_w` - Optional inverter AC power limit (W)
    /// * `microinverter` - Whether the AC limit applies per array
    pub fn new(
        name: impl Into<String>,
        location: Location,
        arrays: Vec<PvArray>,
        inverter_efficiency: f64,
        ac_limit_w: Option<f64>,
        microinverter: bool,
    ) -> Self {
        Self {
            name: name.into(),
            location,
            arrays,
            inverter_efficiency: inverter_efficiency.clamp(0.0, 1.0),
            ac_limit_w: ac_limit_w.map(|w| w.max(0.0)),
            microinverter,
        }
    }

    pub fn arrays(&self) -> &[PvArray] {
        &self.arrays
    }

    /// AC power output (W) at a single instant.
    pub fn ac_power_w(&self, ts: &DateTime<Tz>) -> f64 {
        let sun = solar_position(ts, self.location.latitude, self.location.longitude);
        let irr = clearsky_irradiance(&sun, self.location.altitude);
        let limit = self.ac_limit_w.unwrap_or(f64::INFINITY);

        let mut total = 0.0;
        for array in &self.arrays {
            let poa = plane_of_array(&sun, &irr, array.tilt_deg, array.azimuth_deg);
            let ac = dc_power_w(array, poa) * self.inverter_efficiency;
            total += if self.microinverter { ac.min(limit) } else { ac };
        }
        if self.microinverter {
            total
        } else {
            total.min(limit)
        }
    }
}

impl PvPlant for ClearskyPlant {
    fn name(&self) -> &str {
        &self.name
    }

    /// Energy assumes constant power over the interval that starts at each instant.
    fn clearsky_forecast(&self, timestamps: &TimestampSequence) -> ForecastResult {
        let index: Vec<DateTime<Tz>> = timestamps.iter().copied().collect();
        let power: Vec<f64> = index.iter().map(|ts| self.ac_power_w(ts)).collect();
        let step_hours = timestamps
            .step()
            .map(|step| step.num_seconds() as f64 / 3600.0);
        let energy: Vec<f64> = power
            .iter()
            .map(|p| step_hours.map_or(f64::NAN, |h| p * h))
            .collect();

        ForecastResult {
            name: self.name.clone(),
            ac_power: TimeSeries::new(index.clone(), power),
            ac_energy: TimeSeries::new(index, energy),
        }
    }
}

/// Sun position at `ts` for the given coordinates (degrees).
pub fn solar_position(ts: &DateTime<Tz>, lat_deg: f64, lon_deg: f64) -> SolarPosition {
    let utc = ts.naive_utc();
    let doy = f64::from(utc.ordinal());
    let ut_h = f64::from(utc.hour())
        + f64::from(utc.minute()) / 60.0
        + f64::from(utc.second()) / 3600.0;

    let b = 2.0 * PI * (doy - 1.0) / 365.0;
    let decl = 0.006918 - 0.399912 * b.cos() + 0.070257 * b.sin()
        - 0.006758 * (2.0 * b).cos()
        + 0.000907 * (2.0 * b).sin()
        - 0.002697 * (3.0 * b).cos()
        + 0.00148 * (3.0 * b).sin();
    let eot_min = 229.18
        * (0.000075 + 0.001868 * b.cos()
            - 0.032077 * b.sin()
            - 0.014615 * (2.0 * b).cos()
            - 0.04089 * (2.0 * b).sin());

    // true solar time from UTC
    let solar_time_h = ut_h + lon_deg / 15.0 + eot_min / 60.0;
    let omega = (15.0 * (solar_time_h - 12.0)) * DEG;

    let lat = lat_deg * DEG;
    let cos_zenith = lat.sin() * decl.sin() + lat.cos() * decl.cos() * omega.cos();
    let sin_zenith = (1.0 - cos_zenith * cos_zenith).max(0.0).sqrt();

    let azimuth_deg = if sin_zenith > 1e-9 && lat.cos().abs() > 1e-9 {
        let cos_az = (decl.sin() - cos_zenith * lat.sin()) / (sin_zenith * lat.cos());
        let az = cos_az.clamp(-1.0, 1.0).acos() / DEG;
        if omega > 0.0 { 360.0 - az } else { az }
    } else {
        180.0
    };

    let extra_w_m2 = SOLAR_CONSTANT_W_M2
        * (1.00011
            + 0.034221 * b.cos()
            + 0.00128 * b.sin()
            + 0.000719 * (2.0 * b).cos()
            + 0.000077 * (2.0 * b).sin());

    SolarPosition {
        cos_zenith,
        azimuth_deg,
        extra_w_m2,
    }
}

/// Ratio of site pressure to sea-level pressure (standard atmosphere).
pub fn pressure_ratio(altitude_m: f64) -> f64 {
    (1.0 - 2.25577e-5 * altitude_m).max(0.0).powf(5.25588)
}

/// Clear-sky horizontal irradiance for a sun position at `altitude_m` metres.
pub fn clearsky_irradiance(sun: &SolarPosition, altitude_m: f64) -> Irradiance {
    let cz = sun.cos_zenith;
    if cz <= 0.0 {
        return Irradiance::default();
    }

    let ghi = 1098.0 * cz * (-0.059 * pressure_ratio(altitude_m) / cz).exp();
    let kt = (ghi / (sun.extra_w_m2 * cz)).clamp(0.0, 1.0);
    let diffuse_fraction = if kt <= 0.22 {
        1.0 - 0.09 * kt
    } else if kt <= 0.8 {
        0.9511 - 0.1604 * kt + 4.388 * kt.powi(2) - 16.638 * kt.powi(3) + 12.336 * kt.powi(4)
    } else {
        0.165
    };
    let dhi = ghi * diffuse_fraction;
    let dni = ((ghi - dhi) / cz).max(0.0);

    Irradiance { ghi, dni, dhi }
}

/// Total irradiance on a tilted surface (W/m²).
pub fn plane_of_array(
    sun: &SolarPosition,
    irr: &Irradiance,
    tilt_deg: f64,
    surface_azimuth_deg: f64,
) -> f64 {
    if sun.cos_zenith <= 0.0 {
        return 0.0;
    }
    let tilt = tilt_deg * DEG;
    let sin_zenith = (1.0 - sun.cos_zenith.powi(2)).max(0.0).sqrt();
    let cos_aoi = sun.cos_zenith * tilt.cos()
        + sin_zenith * tilt.sin() * ((sun.azimuth_deg - surface_azimuth_deg) * DEG).cos();

    let beam = irr.dni * cos_aoi.max(0.0);
    let sky_diffuse = irr.dhi * (1.0 + tilt.cos()) / 2.0;
    let ground = irr.ghi * ALBEDO * (1.0 - tilt.cos()) / 2.0;
    (beam + sky_diffuse + ground).max(0.0)
}

/// DC power (W) of an array for a given plane-of-array irradiance.
fn dc_power_w(array: &PvArray, poa_w_m2: f64) -> f64 {
    let cell_temp = CLEARSKY_AMBIENT_C + (NOCT_C - 20.0) * poa_w_m2 / 800.0;
    let temp_factor = 1.0 + array.temp_coeff * (cell_temp - 25.0);
    (array.dc_capacity_w * poa_w_m2 / 1000.0 * temp_factor).max(0.0)
}
