//! File output for forecast results.

pub mod export;
