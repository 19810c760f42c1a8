//! Per-plant forecast adapter.

use crate::engine::clock::TimestampSequence;
use crate::error::PlantNotFound;
use crate::plant::types::{PlantRegistry, Series};

/// Labelled power and energy series of one plant.
#[derive(Debug, Clone, PartialEq)]
pub struct PlantSeries {
    pub name: String,
    /// AC power (W).
    pub power: Series,
    /// AC energy per interval (Wh).
    pub energy: Series,
}

/// Forecasts one plant over `timestamps` and labels the result.
///
/// # Arguments
///
/// * `registry` - Plant lookup
/// * `plant_name` - Name of the plant to forecast
/// * `timestamps` - Shared time index
///
/// # Errors
///
/// Returns [`PlantNotFound`] if the registry does not know `plant_name`.
pub fn forecast(
    registry: &dyn PlantRegistry,
    plant_name: &str,
    timestamps: &TimestampSequence,
) -> Result<PlantSeries, PlantNotFound> {
    let plant = registry.get(plant_name)?;
    let result = plant.clearsky_forecast(timestamps);
    tracing::debug!(plant = plant_name, samples = result.ac_power.len(), "forecast done");

    Ok(PlantSeries {
        name: plant_name.to_string(),
        power: result.ac_power.to_labelled(),
        energy: result.ac_energy.to_labelled(),
    })
}
