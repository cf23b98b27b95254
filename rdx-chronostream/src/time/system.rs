//! Wall-clock time source backed by `chrono` and the tokio timer wheel.

use super::{TimeSource, Timer, TimerFuture};
use chrono::{DateTime, Utc};
use std::pin::Pin;
use std::time::Duration;
use tokio::time::Sleep;

/// The production time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    pub fn new() -> Self {
        Self
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Must be called from within a tokio runtime.
    fn new_timer(&self, wait: Duration) -> Box<dyn Timer> {
        Box::new(SystemTimer::new(wait))
    }
}

/// A one-shot timer over `tokio::time::sleep`.
#[derive(Debug)]
pub struct SystemTimer {
    sleep: Pin<Box<Sleep>>,
    fired: bool,
    stopped: bool,
}

impl SystemTimer {
    pub fn new(wait: Duration) -> Self {
        Self {
            sleep: Box::pin(tokio::time::sleep(wait)),
            fired: false,
            stopped: false,
        }
    }
}

impl Timer for SystemTimer {
    fn fired(&mut self) -> TimerFuture<'_> {
        Box::pin(async move {
            if self.fired || self.stopped {
                std::future::pending::<()>().await;
            }
            self.sleep.as_mut().await;
            self.fired = true;
        })
    }

    fn stop(&mut self) -> bool {
        if self.fired || self.stopped || self.sleep.is_elapsed() {
            return false;
        }
        self.stopped = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_close_to_system_time() {
        let source = SystemTimeSource::new();
        let before = Utc::now();
        let now = source.now();
        let after = Utc::now();
        assert!(now >= before && now <= after);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_after_wait() {
        let source = SystemTimeSource::new();
        let mut timer = source.new_timer(Duration::from_millis(250));
        let started = tokio::time::Instant::now();
        timer.fired().await;
        assert!(started.elapsed() >= Duration::from_millis(250));
        assert!(!timer.stop(), "stop after fire reports not pending");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let mut timer = SystemTimer::new(Duration::from_secs(5));
        assert!(timer.stop());
        assert!(!timer.stop());
        let outcome = tokio::time::timeout(Duration::from_secs(10), timer.fired()).await;
        assert!(outcome.is_err(), "a stopped timer never fires");
    }
}
