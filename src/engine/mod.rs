//! Multi-plant time-series aggregation engine.

pub mod adapter;
pub mod clock;
pub mod nested;
pub mod pipeline;
pub mod table;
pub mod types;
pub mod validate;

pub use clock::{DateSource, Interval, SystemDateSource, TimestampSequence};
pub use pipeline::{ForecastOutcome, ForecastPipeline};
pub use types::{ClearskyRequest, ResponseEnvelope};
