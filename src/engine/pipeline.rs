//! Request pipeline: index, parallel per-plant forecasts, ordered merge,
//! totals, validation and response assembly.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use chrono::TimeDelta;
use chrono_tz::Tz;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use super::adapter::{self, PlantSeries};
use super::clock::{DateSource, Interval, build_index};
use super::nested::{NestedResult, to_nested};
use super::table::{FrozenTable, MultiSeriesTable, TOTAL_METRICS};
use super::types::{ClearskyRequest, Metric, PlantKey, ResponseEnvelope};
use super::validate::{QuantizedTable, validate_and_quantize};
use crate::error::{IncompleteResult, PipelineError, PipelineResult};
use crate::plant::types::{PlantRegistry, Series};

/// Envelope plus the quantized table it was built from.
#[derive(Debug, Clone)]
pub struct ForecastOutcome {
    pub envelope: ResponseEnvelope,
    pub table: QuantizedTable,
}

/// Runs clear-sky requests against a plant registry.
///
/// Per-plant forecasts run on a dedicated bounded thread pool. Results are
/// collected in plant order and merged on the calling thread, so the output
/// does not depend on which worker finishes first.
pub struct ForecastPipeline {
    registry: Arc<dyn PlantRegistry>,
    dates: Arc<dyn DateSource>,
    pool: ThreadPool,
    max_window: TimeDelta,
}

impl ForecastPipeline {
    /// Creates a pipeline with its worker pool.
    ///
    /// # Arguments
    ///
    /// * `registry` - Plant lookup and location timezone
    /// * `dates` - Timestamp generation and the wall clock
    /// * `workers` - Worker threads; 0 uses the available parallelism
    /// * `max_window` - Longest explicit request window
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::WorkerPool`] if the thread pool cannot be built.
    pub fn new(
        registry: Arc<dyn PlantRegistry>,
        dates: Arc<dyn DateSource>,
        workers: usize,
        max_window: TimeDelta,
    ) -> PipelineResult<Self> {
        let workers = if workers == 0 {
            thread::available_parallelism().map_or(1, NonZeroUsize::get)
        } else {
            workers
        };
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("pvcast-forecast-{i}"))
            .build()
            .map_err(|e| PipelineError::WorkerPool(e.to_string()))?;

        Ok(Self {
            registry,
            dates,
            pool,
            max_window,
        })
    }

    pub fn registry(&self) -> &dyn PlantRegistry {
        self.registry.as_ref()
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs one request and returns the response envelope.
    ///
    /// # Errors
    ///
    /// See [`ForecastPipeline::run_detailed`].
    pub fn run(&self, request: &ClearskyRequest) -> PipelineResult<ResponseEnvelope> {
        self.run_detailed(request).map(|outcome| outcome.envelope)
    }

    /// Runs one request and also returns the quantized table.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::Request`] for a malformed window or an interval
    ///   coarser than one hour
    /// * [`PipelineError::PlantNotFound`] when a single named plant is unknown
    /// * [`PipelineError::Incomplete`] when the merged table has missing values
    /// * [`PipelineError::Table`] on column schema misuse
    pub fn run_detailed(&self, request: &ClearskyRequest) -> PipelineResult<ForecastOutcome> {
        self.run_cancellable(request, &AtomicBool::new(false))
    }

    /// Like [`ForecastPipeline::run_detailed`], but stops early once `cancel` is set.
    ///
    /// The flag is checked before each plant forecast and again before the
    /// merge. A plant forecast that already started runs to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Cancelled`] if `cancel` was set, otherwise as
    /// [`ForecastPipeline::run_detailed`].
    pub fn run_cancellable(
        &self,
        request: &ClearskyRequest,
        cancel: &AtomicBool,
    ) -> PipelineResult<ForecastOutcome> {
        request.interval.ensure_energy()?;
        let tz = self.registry.timezone();
        let index = build_index(
            self.dates.as_ref(),
            request.start,
            request.end,
            request.interval,
            tz,
            self.max_window,
        )?;

        let all_mode = request.is_all();
        let names = if all_mode {
            self.registry.plant_names()
        } else {
            self.registry.get(&request.plant_name)?;
            vec![request.plant_name.clone()]
        };
        tracing::info!(
            plant = %request.plant_name,
            interval = %request.interval,
            plants = names.len(),
            samples = index.len(),
            "running clear-sky forecast"
        );

        let mut table = MultiSeriesTable::new(index.labels(), MultiSeriesTable::schema(&names, all_mode));

        let registry = self.registry.as_ref();
        let results: Vec<_> = self.pool.install(|| {
            names
                .par_iter()
                .map(|name| {
                    if cancel.load(Ordering::Relaxed) {
                        return None;
                    }
                    Some(adapter::forecast(registry, name, &index))
                })
                .collect()
        });
        if cancel.load(Ordering::Relaxed) {
            tracing::warn!(plant = %request.plant_name, "forecast cancelled");
            return Err(PipelineError::Cancelled);
        }

        let mut last_power: Option<Series> = None;
        for result in results.into_iter().flatten() {
            match result {
                Ok(series) => last_power = Some(merge(&mut table, series)?),
                Err(e) => tracing::error!(error = %e, "skipping plant"),
            }
        }

        if all_mode {
            table.aggregate_total(&TOTAL_METRICS)?;
        }

        let frozen = table.freeze();
        let quantized = validate_and_quantize(&frozen)?;
        let (start, end) = window_labels(last_power.as_ref(), &frozen)?;

        let envelope = assemble(request.interval, to_nested(&quantized), start, end, tz);
        Ok(ForecastOutcome {
            envelope,
            table: quantized,
        })
    }
}

/// Writes one plant's power and energy and derives its cumulative energy.
fn merge(table: &mut MultiSeriesTable, series: PlantSeries) -> PipelineResult<Series> {
    tracing::info!(plant = %series.name, "merging plant forecast");
    let key = PlantKey::named(series.name.as_str());
    table.put(Metric::Watt, &key, &series.power)?;
    table.put(Metric::WattHours, &key, &series.energy)?;
    table.compute_cumulative(&series.name)?;
    Ok(series.power)
}

fn window_labels(
    power: Option<&Series>,
    table: &FrozenTable,
) -> Result<(String, String), IncompleteResult> {
    power
        .and_then(|p| Some((p.first_label()?.to_string(), p.last_label()?.to_string())))
        .ok_or_else(|| IncompleteResult {
            columns: Vec::new(),
            table: table.render(),
        })
}

/// Wraps the nested result with window metadata.
///
/// `start` and `end` are the first and last labels of the power series of
/// the last plant that was merged.
pub fn assemble(
    interval: Interval,
    result: NestedResult,
    start: String,
    end: String,
    timezone: Tz,
) -> ResponseEnvelope {
    ResponseEnvelope {
        interval,
        start,
        end,
        timezone: timezone.name().to_string(),
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PvcastConfig;
    use crate::engine::clock::SystemDateSource;
    use crate::plant::ConfiguredRegistry;
    use chrono::{TimeZone, Utc};

    fn pipeline(workers: usize) -> ForecastPipeline {
        let registry = ConfiguredRegistry::from_config(&PvcastConfig::demo()).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 21, 10, 0, 0).unwrap();
        ForecastPipeline::new(
            Arc::new(registry),
            Arc::new(SystemDateSource::pinned(now)),
            workers,
            TimeDelta::days(7),
        )
        .unwrap()
    }

    #[test]
    fn default_window_has_two_instants() {
        let env = pipeline(2)
            .run(&ClearskyRequest::new("South", Interval::OneHour))
            .unwrap();
        assert_eq!(env.start, "2024-06-21T12:00:00+0200");
        assert_eq!(env.end, "2024-06-21T13:00:00+0200");
        assert_eq!(env.timezone, "Europe/Amsterdam");
        assert_eq!(env.result.metrics(), vec!["watt", "watt_hours", "watt_hours_cumsum"]);
        assert_eq!(env.result.plants("watt"), vec!["South"]);
    }

    #[test]
    fn all_mode_adds_totals() {
        let env = pipeline(2)
            .run(&ClearskyRequest::new("ALL", Interval::OneHour))
            .unwrap();
        assert_eq!(env.result.plants("watt"), vec!["EastWest", "South", "Total"]);
        let ts = "2024-06-21T12:00:00+0200";
        let a = env.result.get("watt", "EastWest", ts).unwrap();
        let b = env.result.get("watt", "South", ts).unwrap();
        let total = env.result.get("watt", "Total", ts).unwrap();
        assert!((total - a - b).abs() <= 1);
    }

    #[test]
    fn unknown_single_plant_fails_fast() {
        let err = pipeline(1)
            .run(&ClearskyRequest::new("Carport", Interval::OneHour))
            .unwrap_err();
        assert!(matches!(err, PipelineError::PlantNotFound(_)));
    }

    #[test]
    fn worker_count_does_not_change_output() {
        let req = ClearskyRequest::new("all", Interval::FifteenMinutes);
        let one = pipeline(1).run(&req).unwrap();
        let four = pipeline(4).run(&req).unwrap();
        assert_eq!(one, four);
    }

    #[test]
    fn daily_interval_is_rejected_for_energy() {
        let err = pipeline(1)
            .run(&ClearskyRequest::new("South", Interval::OneDay))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Request(crate::error::RequestError::EnergyInterval(ref iv)) if iv == "1D"
        ));
    }

    #[test]
    fn cancelled_request_stops_before_merge() {
        let cancel = AtomicBool::new(true);
        let err = pipeline(1)
            .run_cancellable(&ClearskyRequest::new("all", Interval::OneHour), &cancel)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }

    #[test]
    fn zero_workers_uses_available_parallelism() {
        assert!(pipeline(0).workers() >= 1);
    }
}
