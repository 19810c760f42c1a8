//! Error types shared by the forecast pipeline.

use thiserror::Error;

/// A plant name that the registry does not know.
///
/// Recoverable when forecasting all plants (the plant is skipped), fatal for
/// a request that names a single plant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no PV plant found with name \"{0}\"")]
pub struct PlantNotFound(pub String);

/// A request rejected before any forecasting work starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("interval \"{0}\" is not a fixed duration and cannot be used as a time step")]
    UnsupportedInterval(String),

    #[error("unknown interval \"{0}\"")]
    UnknownInterval(String),

    #[error("cannot calculate energy for interval \"{0}\": must be <= 1H")]
    EnergyInterval(String),

    #[error("invalid window: {0}")]
    InvalidWindow(String),
}

/// Misuse of the multi-series table schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("column {metric}/{plant} is not part of the table schema")]
    UnknownColumn { metric: String, plant: String },
}

/// The aggregated table still has holes after all plants were processed.
///
/// Carries the offending columns and a rendering of the whole table so the
/// caller can report what went wrong upstream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing values in the result table for columns [{}]", .columns.join(", "))]
pub struct IncompleteResult {
    /// `metric/plant` labels of every incomplete column.
    pub columns: Vec<String>,
    /// Text dump of the table at validation time.
    pub table: String,
}

/// Top-level error returned by [`crate::engine::pipeline::ForecastPipeline::run`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    PlantNotFound(#[from] PlantNotFound),

    #[error(transparent)]
    Incomplete(#[from] IncompleteResult),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("forecast cancelled")]
    Cancelled,

    #[error("failed to build forecast worker pool: {0}")]
    WorkerPool(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
