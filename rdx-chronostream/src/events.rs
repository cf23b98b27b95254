//! Defines the values that flow through the pipeline.
//!
//! A `Tick` is the scheduler's ephemeral output. An `Event` is the immutable
//! record handed to downstream transports and is the only shape external code
//! ever sees.

use crate::common::Frequency;
use chrono::{DateTime, Utc};

/// Version of the `Event` shape. Bumped only when fields change meaning.
pub const SCHEMA_VERSION: u32 = 1;

/// A single scheduled firing for one calendar boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// The frequency this tick was scheduled for.
    pub frequency: Frequency,
    /// The boundary this tick represents, in nanoseconds since the Unix epoch.
    /// Never the instant the tick was observed or processed.
    pub scheduled_time: i64,
}

impl Tick {
    pub fn new(frequency: Frequency, scheduled_time: i64) -> Self {
        Self {
            frequency,
            scheduled_time,
        }
    }

    pub fn scheduled_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.scheduled_time)
    }
}

/// An immutable, fully reproducible tick event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Event {
    pub id: String,
    /// Boundary instant in nanoseconds since the Unix epoch.
    pub timestamp: i64,
    pub frequency: Frequency,
    pub sequence: u64,
    pub seed: i64,
    pub schema_version: u32,
    pub producer_version: String,
    pub instance_id: String,
}

impl Event {
    pub fn occurred_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.timestamp)
    }
}

/// Builds an event from its identity dimensions.
///
/// This is a pure function: the same inputs produce an identical `Event` on
/// every call and in every process. The `id` and `seed` derivations are a
/// compatibility contract with downstream consumers and must not change.
pub fn build(
    frequency: Frequency,
    timestamp: i64,
    sequence: u64,
    producer_version: &str,
    instance_id: &str,
) -> Event {
    Event {
        id: build_id(frequency, timestamp, sequence),
        timestamp,
        frequency,
        sequence,
        seed: build_seed(timestamp, sequence),
        schema_version: SCHEMA_VERSION,
        producer_version: producer_version.to_owned(),
        instance_id: instance_id.to_owned(),
    }
}

fn build_id(frequency: Frequency, timestamp: i64, sequence: u64) -> String {
    format!("{}-{}-{}", frequency.ordinal(), timestamp, sequence)
}

// Bit-reinterpreting the sequence keeps the mix reversible for any u64.
fn build_seed(timestamp: i64, sequence: u64) -> i64 {
    timestamp ^ (sequence as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn boundary() -> i64 {
        Utc.with_ymd_and_hms(2026, 2, 20, 10, 15, 43)
            .unwrap()
            .timestamp_nanos_opt()
            .unwrap()
    }

    #[test]
    fn build_is_deterministic() {
        let ts = boundary();
        let first = build(Frequency::Second, ts, 7, "v1.0", "02905");
        let second = build(Frequency::Second, ts, 7, "v1.0", "02905");
        assert_eq!(first, second);
    }

    #[test]
    fn id_and_seed_follow_the_published_derivation() {
        let ts = boundary();
        let event = build(Frequency::Minute, ts, 3, "v1.0", "02905");
        assert_eq!(event.id, format!("2-{}-3", ts));
        assert_eq!(event.seed, ts ^ 3);
        assert_eq!(event.schema_version, 1);
        assert_eq!(event.producer_version, "v1.0");
        assert_eq!(event.instance_id, "02905");
    }

    #[test]
    fn ids_differ_across_every_dimension() {
        let ts = boundary();
        let base = build(Frequency::Second, ts, 1, "v", "i");
        assert_ne!(base.id, build(Frequency::Minute, ts, 1, "v", "i").id);
        assert_ne!(base.id, build(Frequency::Second, ts + 1, 1, "v", "i").id);
        assert_ne!(base.id, build(Frequency::Second, ts, 2, "v", "i").id);
    }

    #[test]
    fn seed_reinterprets_large_sequences() {
        let event = build(Frequency::Hour, 0, u64::MAX, "v", "i");
        assert_eq!(event.seed, -1);
    }

    #[test]
    fn tick_exposes_boundary_as_datetime() {
        let tick = Tick::new(Frequency::Second, boundary());
        assert_eq!(
            tick.scheduled_at(),
            Utc.with_ymd_and_hms(2026, 2, 20, 10, 15, 43).unwrap()
        );
    }
}
