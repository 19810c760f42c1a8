//! PV plants and the registry that resolves them by name.

pub mod registry;
pub mod solar;
pub mod types;

pub use registry::ConfiguredRegistry;
pub use solar::{ClearskyPlant, Location, PvArray};
pub use types::{ForecastResult, PlantRegistry, PvPlant, Series, TimeSeries};
