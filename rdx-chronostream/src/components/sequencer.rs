//! Per-frequency monotonic sequence numbers.

use crate::common::Frequency;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Hands out the next sequence number for a frequency.
///
/// Implementations must never reset: downstream consumers deduplicate on the
/// `(frequency, timestamp, sequence)` identity.
pub trait Sequencer: Send + Sync {
    /// Increments and returns the counter for `frequency`. The first call
    /// for any frequency returns 1.
    fn next(&self, frequency: Frequency) -> u64;

    /// The last value handed out for `frequency`, or 0 if none yet.
    fn current(&self, frequency: Frequency) -> u64;
}

/// Mutex-guarded counters, one per frequency.
#[derive(Debug, Default)]
pub struct FrequencySequencer {
    counters: Mutex<HashMap<Frequency, u64>>,
}

impl FrequencySequencer {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self) -> MutexGuard<'_, HashMap<Frequency, u64>> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Sequencer for FrequencySequencer {
    fn next(&self, frequency: Frequency) -> u64 {
        let mut counters = self.counters();
        let counter = counters.entry(frequency).or_insert(0);
        *counter += 1;
        *counter
    }

    fn current(&self, frequency: Frequency) -> u64 {
        self.counters().get(&frequency).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counts_from_one() {
        let sequencer = FrequencySequencer::new();
        assert_eq!(sequencer.current(Frequency::Second), 0);
        assert_eq!(sequencer.next(Frequency::Second), 1);
        assert_eq!(sequencer.next(Frequency::Second), 2);
        assert_eq!(sequencer.next(Frequency::Second), 3);
        assert_eq!(sequencer.current(Frequency::Second), 3);
    }

    #[test]
    fn frequencies_are_independent() {
        let sequencer = FrequencySequencer::new();
        sequencer.next(Frequency::Second);
        sequencer.next(Frequency::Second);
        assert_eq!(sequencer.next(Frequency::Minute), 1);
        assert_eq!(sequencer.next(Frequency::Second), 3);
        assert_eq!(sequencer.current(Frequency::Day), 0);
    }

    #[test]
    fn concurrent_callers_never_share_a_number() {
        let sequencer = Arc::new(FrequencySequencer::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sequencer = Arc::clone(&sequencer);
                std::thread::spawn(move || {
                    (0..250)
                        .map(|_| sequencer.next(Frequency::Hour))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen: Vec<u64> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (1..=1000).collect::<Vec<_>>());
    }
}
