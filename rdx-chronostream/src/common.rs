//! Contains common, primitive types shared by every part of the pipeline.
//!
//! `Frequency` is part of the external contract: its ordinals are stamped into
//! every event ID and must never be reordered. New cadences may only be
//! appended.

use crate::error::{ChronoError, ChronoResult};
use serde::Deserialize;
use slotmap::new_key_type;
use std::fmt;
use std::str::FromStr;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

new_key_type! {
    /// Uniquely identifies a running stream inside a `Producer`.
    ///
    /// Keys are never reused, so a handle kept after its stream was removed
    /// cannot accidentally address a newer stream.
    pub struct StreamId;
}

/// The cadence a scheduler fires at.
///
/// `Unknown` exists so that a zeroed or unrecognized ordinal has somewhere to
/// land; it carries no timing semantics and is rejected wherever a boundary or
/// period is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Frequency {
    Unknown = 0,
    Second = 1,
    Minute = 2,
    Hour = 3,
    Day = 4,
}

impl Frequency {
    /// Every frequency with defined timing semantics, in ordinal order.
    pub const SUPPORTED: [Frequency; 4] = [
        Frequency::Second,
        Frequency::Minute,
        Frequency::Hour,
        Frequency::Day,
    ];

    /// The stable wire ordinal.
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Returns the frequency itself, or an error for `Unknown`.
    pub fn supported(self) -> ChronoResult<Self> {
        match self {
            Frequency::Unknown => Err(ChronoError::UnsupportedFrequency(self.ordinal())),
            Frequency::Second | Frequency::Minute | Frequency::Hour | Frequency::Day => Ok(self),
        }
    }

    /// Length of one unit in nanoseconds.
    ///
    /// For `Day` this is the nominal 24 hours. Day boundaries are never derived
    /// from it because calendar days are not always 24 hours long.
    pub fn unit_nanos(self) -> ChronoResult<i64> {
        match self {
            Frequency::Second => Ok(NANOS_PER_SECOND),
            Frequency::Minute => Ok(60 * NANOS_PER_SECOND),
            Frequency::Hour => Ok(3_600 * NANOS_PER_SECOND),
            Frequency::Day => Ok(86_400 * NANOS_PER_SECOND),
            Frequency::Unknown => Err(ChronoError::UnsupportedFrequency(self.ordinal())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Unknown => "unknown",
            Frequency::Second => "second",
            Frequency::Minute => "minute",
            Frequency::Hour => "hour",
            Frequency::Day => "day",
        }
    }
}

impl TryFrom<u8> for Frequency {
    type Error = ChronoError;

    fn try_from(ordinal: u8) -> Result<Self, Self::Error> {
        match ordinal {
            0 => Ok(Frequency::Unknown),
            1 => Ok(Frequency::Second),
            2 => Ok(Frequency::Minute),
            3 => Ok(Frequency::Hour),
            4 => Ok(Frequency::Day),
            other => Err(ChronoError::UnsupportedFrequency(other)),
        }
    }
}

impl FromStr for Frequency {
    type Err = ChronoError;

    /// Parses a supported cadence name. `unknown` is not accepted here since
    /// nothing parsed from user input should ever be scheduled with it.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        match name.to_ascii_lowercase().as_str() {
            "second" | "s" => Ok(Frequency::Second),
            "minute" | "m" => Ok(Frequency::Minute),
            "hour" | "h" => Ok(Frequency::Hour),
            "day" | "d" => Ok(Frequency::Day),
            _ => Err(ChronoError::UnrecognizedFrequency(name.to_string())),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
