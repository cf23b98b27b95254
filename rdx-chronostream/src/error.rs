//! Construction-time errors for the Chronostream pipeline.
//!
//! None of these are raised from inside a running loop. A scheduler, buffer or
//! producer that was built successfully never fails afterwards; backpressure
//! is absorbed as dropped ticks or events.

use crate::common::Frequency;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChronoError {
    /// A frequency ordinal that has no timing semantics.
    #[error("unsupported frequency ordinal {0}")]
    UnsupportedFrequency(u8),

    /// A frequency name that matches no supported cadence.
    #[error("unrecognized frequency '{0}', expected one of second, minute, hour, day")]
    UnrecognizedFrequency(String),

    /// A bounded channel or buffer was configured with zero slots.
    #[error("{0} capacity must be greater than zero")]
    ZeroCapacity(&'static str),

    /// The instant cannot be represented as nanoseconds since the Unix epoch.
    #[error("instant is outside the representable nanosecond range")]
    TimestampOutOfRange,

    /// A producer already runs a stream for this frequency.
    #[error("a stream for frequency '{0}' is already running")]
    DuplicateStream(Frequency),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type ChronoResult<T> = Result<T, ChronoError>;
