//! Wall-clock aligned tick scheduling.
//!
//! A scheduler fires on absolute calendar boundaries, not on offsets from
//! whenever it was started. Every iteration re-reads the clock and waits for
//! the distance to the next true boundary, so late wake-ups, pauses and
//! contention never accumulate into drift. Two schedulers of the same
//! frequency, or one restarted mid-run, stay in lockstep with real time.
//!
//! The wall clock moving backwards is not special-cased. The scheduler keeps
//! waiting on the timer it already armed and, on the following iteration,
//! recomputes a (possibly long) forward wait from the earlier clock reading.

use crate::common::Frequency;
use crate::error::{ChronoError, ChronoResult};
use crate::events::Tick;
use crate::time::TimeSource;
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, trace};

/// Emits ticks for exactly one frequency.
pub trait Scheduler: Send {
    fn frequency(&self) -> Frequency;

    /// Spawns the scheduling loop and returns the tick stream.
    ///
    /// The loop runs until `shutdown` yields (a message or a dropped sender)
    /// or the returned receiver is dropped. The receiver yields `None` once
    /// the loop has terminated.
    fn start(self: Box<Self>, shutdown: broadcast::Receiver<()>) -> mpsc::Receiver<Tick>;
}

/// Computes the next calendar boundary strictly after `now`.
///
/// Second, minute and hour boundaries are aligned to the Unix epoch: `now` is
/// truncated to the unit and one unit is added. Day boundaries are the next
/// local midnight in `now`'s time zone, so days across a DST change are 23 or
/// 25 hours long. An ambiguous midnight resolves to its earliest instant; a
/// midnight skipped by a DST jump resolves to the first whole hour that exists
/// on that date.
pub fn next_boundary<Z: TimeZone>(
    now: &DateTime<Z>,
    frequency: Frequency,
) -> ChronoResult<DateTime<Z>> {
    match frequency {
        Frequency::Second | Frequency::Minute | Frequency::Hour => {
            let unit = frequency.unit_nanos()?;
            let nanos = now
                .timestamp_nanos_opt()
                .ok_or(ChronoError::TimestampOutOfRange)?;
            let next = nanos
                .div_euclid(unit)
                .checked_mul(unit)
                .and_then(|truncated| truncated.checked_add(unit))
                .ok_or(ChronoError::TimestampOutOfRange)?;
            Ok(DateTime::from_timestamp_nanos(next).with_timezone(&now.timezone()))
        }
        Frequency::Day => {
            let zone = now.timezone();
            let tomorrow = now
                .date_naive()
                .succ_opt()
                .ok_or(ChronoError::TimestampOutOfRange)?;
            (0..24)
                .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
                .find_map(|time| zone.from_local_datetime(&tomorrow.and_time(time)).earliest())
                .ok_or(ChronoError::TimestampOutOfRange)
        }
        Frequency::Unknown => Err(ChronoError::UnsupportedFrequency(frequency.ordinal())),
    }
}

/// The production scheduler, generic over its clock.
pub struct ClockScheduler<T: TimeSource> {
    frequency: Frequency,
    time_source: Arc<T>,
    timezone: Tz,
    tick_capacity: usize,
}

impl<T: TimeSource> ClockScheduler<T> {
    /// Builds a scheduler that computes day boundaries in UTC.
    pub fn new(
        frequency: Frequency,
        time_source: Arc<T>,
        tick_capacity: usize,
    ) -> ChronoResult<Self> {
        Self::with_timezone(frequency, time_source, tick_capacity, Tz::UTC)
    }

    pub fn with_timezone(
        frequency: Frequency,
        time_source: Arc<T>,
        tick_capacity: usize,
        timezone: Tz,
    ) -> ChronoResult<Self> {
        let frequency = frequency.supported()?;
        if tick_capacity == 0 {
            return Err(ChronoError::ZeroCapacity("tick channel"));
        }
        info!(%frequency, %timezone, tick_capacity, "creating scheduler");
        Ok(Self {
            frequency,
            time_source,
            timezone,
            tick_capacity,
        })
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Reads the clock and returns the next boundary with the wait until it.
    fn plan(&self) -> ChronoResult<(DateTime<Utc>, Duration)> {
        let now = self.time_source.now();
        let boundary =
            next_boundary(&now.with_timezone(&self.timezone), self.frequency)?.with_timezone(&Utc);
        // A negative distance only happens if the clock moved between reads.
        let wait = (boundary - now).to_std().unwrap_or(Duration::ZERO);
        Ok((boundary, wait))
    }

    async fn run(self, mut shutdown: broadcast::Receiver<()>, ticks: mpsc::Sender<Tick>) {
        debug!(frequency = %self.frequency, "scheduler loop started");
        loop {
            let (boundary, wait) = match self.plan() {
                Ok(plan) => plan,
                Err(e) => {
                    error!(frequency = %self.frequency, "cannot compute next boundary: {}", e);
                    break;
                }
            };
            let scheduled_time = match boundary.timestamp_nanos_opt() {
                Some(nanos) => nanos,
                None => {
                    error!(frequency = %self.frequency, %boundary, "boundary outside nanosecond range");
                    break;
                }
            };

            let mut timer = self.time_source.new_timer(wait);
            let fired = tokio::select! {
                biased;
                _ = shutdown.recv() => false,
                _ = timer.fired() => true,
            };
            if !fired {
                timer.stop();
                debug!(frequency = %self.frequency, "scheduler received shutdown");
                break;
            }

            let tick = Tick::new(self.frequency, scheduled_time);
            match ticks.try_send(tick) {
                Ok(()) => trace!(frequency = %self.frequency, %boundary, "tick emitted"),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(frequency = %self.frequency, %boundary, "tick channel full, dropping tick")
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(frequency = %self.frequency, "tick receiver dropped, stopping scheduler");
                    break;
                }
            }
        }
    }
}

impl<T: TimeSource> Scheduler for ClockScheduler<T> {
    fn frequency(&self) -> Frequency {
        self.frequency
    }

    fn start(self: Box<Self>, shutdown: broadcast::Receiver<()>) -> mpsc::Receiver<Tick> {
        let (tx, rx) = mpsc::channel(self.tick_capacity);
        tokio::spawn((*self).run(shutdown, tx));
        rx
    }
}
