//! Time axis for a forecast request: intervals, timestamp sequences and the
//! date source that generates them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, SubsecRound, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};

use crate::error::RequestError;

/// Display format of every timestamp label in a response.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Formats an instant as a response label, e.g. `2024-06-21T12:00:00+0200`.
pub fn format_timestamp(ts: &DateTime<Tz>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Step size of the returned data.
///
/// Only fixed durations are usable as a time step; `1M` and `1Y` are
/// recognised on input but rejected with [`RequestError::UnsupportedInterval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    OneDay,
    OneWeek,
}

impl Interval {
    /// Every supported interval, shortest first.
    pub const ALL: &[Interval] = &[
        Interval::OneMinute,
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::ThirtyMinutes,
        Interval::OneHour,
        Interval::OneDay,
        Interval::OneWeek,
    ];

    /// Canonical wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Interval::OneMinute => "1Min",
            Interval::FiveMinutes => "5Min",
            Interval::FifteenMinutes => "15Min",
            Interval::ThirtyMinutes => "30Min",
            Interval::OneHour => "1H",
            Interval::OneDay => "1D",
            Interval::OneWeek => "1W",
        }
    }

    /// Length of one step.
    pub fn duration(self) -> TimeDelta {
        match self {
            Interval::OneMinute => TimeDelta::minutes(1),
            Interval::FiveMinutes => TimeDelta::minutes(5),
            Interval::FifteenMinutes => TimeDelta::minutes(15),
            Interval::ThirtyMinutes => TimeDelta::minutes(30),
            Interval::OneHour => TimeDelta::hours(1),
            Interval::OneDay => TimeDelta::days(1),
            Interval::OneWeek => TimeDelta::weeks(1),
        }
    }

    /// Rejects intervals too coarse to turn sampled power into energy.
    ///
    /// Energy per step is power times step length, which only holds while the
    /// step is at most an hour.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::EnergyInterval`] for `1D` and `1W`.
    pub fn ensure_energy(self) -> Result<(), RequestError> {
        if self.duration() > TimeDelta::hours(1) {
            return Err(RequestError::EnergyInterval(self.as_str().to_string()));
        }
        Ok(())
    }
}

impl FromStr for Interval {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1Min" | "1min" => Ok(Interval::OneMinute),
            "5Min" | "5min" => Ok(Interval::FiveMinutes),
            "15Min" | "15min" => Ok(Interval::FifteenMinutes),
            "30Min" | "30min" => Ok(Interval::ThirtyMinutes),
            "1H" | "1h" => Ok(Interval::OneHour),
            "1D" | "1d" => Ok(Interval::OneDay),
            "1W" | "1w" => Ok(Interval::OneWeek),
            "1M" | "1Y" | "1y" => Err(RequestError::UnsupportedInterval(s.to_string())),
            _ => Err(RequestError::UnknownInterval(s.to_string())),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Interval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Ordered, unique, timezone-aware instants shared by every plant of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampSequence {
    instants: Vec<DateTime<Tz>>,
    step: Option<TimeDelta>,
}

impl TimestampSequence {
    /// Builds a sequence, sorting the instants and dropping duplicates.
    ///
    /// The step is inferred from the first two instants.
    pub fn from_instants(mut instants: Vec<DateTime<Tz>>) -> Self {
        instants.sort();
        instants.dedup();
        let step = match instants.as_slice() {
            [a, b, ..] => Some(*b - *a),
            _ => None,
        };
        Self { instants, step }
    }

    /// Builds a regular grid with a known step, even if it holds a single instant.
    pub fn with_step(instants: Vec<DateTime<Tz>>, step: TimeDelta) -> Self {
        let mut seq = Self::from_instants(instants);
        seq.step = Some(step);
        seq
    }

    /// Spacing between consecutive instants, if known.
    pub fn step(&self) -> Option<TimeDelta> {
        self.step
    }

    pub fn len(&self) -> usize {
        self.instants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DateTime<Tz>> {
        self.instants.iter()
    }

    /// Response labels of every instant, in order.
    pub fn labels(&self) -> Vec<String> {
        self.instants.iter().map(format_timestamp).collect()
    }
}

/// Generates concrete timestamps for a window.
///
/// Implementations must be deterministic for a given input; only
/// [`DateSource::default_window`] may depend on the wall clock.
pub trait DateSource: Send + Sync {
    /// Instants `start, start + interval, …` up to and including `end`.
    ///
    /// Steps are fixed durations added in absolute time, not calendar steps
    /// in the local zone. Across a DST change a `1D` or `1W` sequence keeps
    /// its 24 h or 168 h spacing, so its local labels shift by the offset
    /// change (`T00:00:00+0100` is followed by `T01:00:00+0200`).
    fn build(&self, start: DateTime<Tz>, end: DateTime<Tz>, interval: Interval)
    -> TimestampSequence;

    /// Window used when a request carries no start/end: `(now, now + interval)`.
    fn default_window(&self, interval: Interval, tz: Tz) -> (DateTime<Tz>, DateTime<Tz>);
}

/// Date source backed by the system clock.
///
/// Tests pin `now` with [`SystemDateSource::pinned`] to make the default
/// window reproducible.
#[derive(Debug, Clone, Default)]
pub struct SystemDateSource {
    pinned_now: Option<DateTime<Utc>>,
}

impl SystemDateSource {
    pub fn new() -> Self {
        Self { pinned_now: None }
    }

    /// A date source whose clock is frozen at `now`.
    pub fn pinned(now: DateTime<Utc>) -> Self {
        Self {
            pinned_now: Some(now),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.pinned_now.unwrap_or_else(Utc::now).trunc_subsecs(0)
    }
}

impl DateSource for SystemDateSource {
    fn build(
        &self,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
        interval: Interval,
    ) -> TimestampSequence {
        let step = interval.duration();
        let mut instants = Vec::new();
        let mut t = start;
        while t <= end {
            instants.push(t);
            match t.checked_add_signed(step) {
                Some(next) => t = next,
                None => break,
            }
        }
        TimestampSequence::with_step(instants, step)
    }

    fn default_window(&self, interval: Interval, tz: Tz) -> (DateTime<Tz>, DateTime<Tz>) {
        let start = self.now().with_timezone(&tz);
        (start, start + interval.duration())
    }
}

/// Resolves a request window into the shared timestamp index.
///
/// Start and end must be given together. Without them the date source's
/// default window is used. Explicit windows are checked before any
/// forecasting happens: `end` may not precede `start` and the span may not
/// exceed `max_window`.
///
/// # Errors
///
/// Returns [`RequestError::InvalidWindow`] for a malformed window.
pub fn build_index(
    source: &dyn DateSource,
    start: Option<DateTime<FixedOffset>>,
    end: Option<DateTime<FixedOffset>>,
    interval: Interval,
    tz: Tz,
    max_window: TimeDelta,
) -> Result<TimestampSequence, RequestError> {
    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => {
            if end < start {
                return Err(RequestError::InvalidWindow(format!(
                    "end ({end}) is before start ({start})"
                )));
            }
            if end - start > max_window {
                return Err(RequestError::InvalidWindow(format!(
                    "window of {} hours exceeds the maximum of {} hours",
                    (end - start).num_hours(),
                    max_window.num_hours()
                )));
            }
            (start.with_timezone(&tz), end.with_timezone(&tz))
        }
        (None, None) => {
            tracing::info!("no start and end timestamps provided, using current time and interval");
            source.default_window(interval, tz)
        }
        _ => {
            return Err(RequestError::InvalidWindow(
                "start and end must be given together".to_string(),
            ));
        }
    };
    Ok(source.build(start, end, interval))
}
