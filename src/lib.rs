//! Clear-sky PV forecast aggregation across multiple plants.

#[cfg(feature = "api")]
pub mod api;
pub mod config;
/// Time index, per-plant adapter, multi-series table, validation and pipeline.
pub mod engine;
pub mod error;
pub mod io;
pub mod plant;
