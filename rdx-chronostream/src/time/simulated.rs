//! A virtual clock for deterministic tests.
//!
//! Time only moves when the test calls [`SimulatedClock::advance`] or
//! [`SimulatedClock::set_now`]. Due timers are fired synchronously inside those
//! calls, so once `advance` returns every tick it made due has already been
//! signalled to its waiting scheduler.

use super::{TimeSource, Timer, TimerFuture};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::trace;

struct PendingTimer {
    deadline: DateTime<Utc>,
    active: Arc<AtomicBool>,
    fire: oneshot::Sender<DateTime<Utc>>,
}

struct ClockState {
    now: DateTime<Utc>,
    timers: Vec<PendingTimer>,
}

struct Inner {
    state: Mutex<ClockState>,
    created: watch::Sender<u64>,
}

/// A cloneable handle to a shared virtual clock.
#[derive(Clone)]
pub struct SimulatedClock {
    inner: Arc<Inner>,
}

impl SimulatedClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        let (created, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ClockState {
                    now: start,
                    timers: Vec::new(),
                }),
                created,
            }),
        }
    }

    /// Moves virtual time forward and fires every timer that became due.
    pub fn advance(&self, by: Duration) {
        let mut state = self.lock();
        state.now = offset(state.now, by);
        Self::fire_due(&mut state);
    }

    /// Jumps virtual time to `instant`, which may lie in the past.
    ///
    /// Timers keep the deadline they were created with, so moving backwards
    /// only postpones them.
    pub fn set_now(&self, instant: DateTime<Utc>) {
        let mut state = self.lock();
        state.now = instant;
        Self::fire_due(&mut state);
    }

    /// Number of timers that have neither fired nor been stopped.
    pub fn pending_timers(&self) -> usize {
        self.lock()
            .timers
            .iter()
            .filter(|timer| timer.active.load(Ordering::Acquire))
            .count()
    }

    /// Total number of timers ever created on this clock.
    pub fn timers_created(&self) -> u64 {
        *self.inner.created.borrow()
    }

    /// Waits until at least `count` timers have been created.
    ///
    /// A scheduler creates one timer per loop iteration, so waiting for the
    /// n-th timer means the scheduler has settled on its n-th boundary.
    pub async fn wait_for_timers(&self, count: u64) {
        let mut created = self.inner.created.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = created.wait_for(|total| *total >= count).await;
    }

    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fire_due(state: &mut ClockState) {
        let now = state.now;
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut state.timers)
            .into_iter()
            .filter(|timer| timer.active.load(Ordering::Acquire))
            .partition(|timer| timer.deadline <= now);
        state.timers = waiting;
        for timer in due {
            if timer.active.swap(false, Ordering::AcqRel) {
                trace!(deadline = %timer.deadline, %now, "simulated timer fired");
                let _ = timer.fire.send(now);
            }
        }
    }
}

// Saturates at the end of representable time.
fn offset(from: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(by)
        .ok()
        .and_then(|step| from.checked_add_signed(step))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl TimeSource for SimulatedClock {
    fn now(&self) -> DateTime<Utc> {
        self.lock().now
    }

    fn new_timer(&self, wait: Duration) -> Box<dyn Timer> {
        let (fire, fired) = oneshot::channel();
        let active = Arc::new(AtomicBool::new(true));
        {
            let mut state = self.lock();
            let deadline = offset(state.now, wait);
            state.timers.push(PendingTimer {
                deadline,
                active: Arc::clone(&active),
                fire,
            });
            // A deadline at or before the virtual instant fires on creation
            // rather than waiting for the next advance.
            Self::fire_due(&mut state);
        }
        self.inner.created.send_modify(|total| *total += 1);
        Box::new(SimulatedTimer {
            fired,
            active,
            done: false,
        })
    }
}

/// Timer handed out by [`SimulatedClock`].
pub struct SimulatedTimer {
    fired: oneshot::Receiver<DateTime<Utc>>,
    active: Arc<AtomicBool>,
    done: bool,
}

impl Timer for SimulatedTimer {
    fn fired(&mut self) -> TimerFuture<'_> {
        Box::pin(async move {
            if self.done {
                std::future::pending::<()>().await;
            }
            match (&mut self.fired).await {
                Ok(_) => self.done = true,
                // Stopped timers are dropped from the clock without firing.
                Err(_) => {
                    self.done = true;
                    std::future::pending::<()>().await;
                }
            }
        })
    }

    fn stop(&mut self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }
}
