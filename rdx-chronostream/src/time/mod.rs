//! The clock capability the scheduler is built on.
//!
//! Schedulers never read the system clock directly. They receive a
//! `TimeSource` at construction, which makes the boundary algorithm runnable
//! against a virtual clock in tests and against the wall clock in production.

mod simulated;
mod system;

pub use simulated::{SimulatedClock, SimulatedTimer};
pub use system::{SystemTimeSource, SystemTimer};

use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Future returned by [`Timer::fired`].
pub type TimerFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// A source of wall-clock time and one-shot timers.
///
/// `now` is the only operation shared between concurrent schedulers; every
/// call to `new_timer` returns an independently owned timer.
pub trait TimeSource: Send + Sync + 'static {
    /// The current wall-clock instant, in UTC.
    fn now(&self) -> DateTime<Utc>;

    /// Starts a one-shot timer that fires once `wait` has elapsed.
    fn new_timer(&self, wait: Duration) -> Box<dyn Timer>;
}

/// A cancellable, single-fire timer.
pub trait Timer: Send {
    /// Resolves once, when the deadline passes.
    ///
    /// After the timer has fired or been stopped the returned future never
    /// resolves. Dropping the future before completion is safe and does not
    /// consume the fire.
    fn fired(&mut self) -> TimerFuture<'_>;

    /// Cancels the timer. Returns `true` if it was still pending, `false` if
    /// it had already fired or been stopped.
    fn stop(&mut self) -> bool;
}
