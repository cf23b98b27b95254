//! Defines the configuration for a Chronostream producer.
//!
//! Settings are loaded with the `config` crate from an optional TOML file and
//! then from `CHRONOSTREAM__*` environment variables, and deserialized with
//! `serde`. Every field has a default so an empty file is a valid config.

use crate::common::Frequency;
use crate::error::{ChronoError, ChronoResult};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;

/// Everything the composition root needs to build its streams.
#[derive(Debug, Clone, Deserialize)]
pub struct ProducerConfig {
    /// Stamped into every event as `producer_version`.
    #[serde(default = "default_producer_version")]
    pub producer_version: String,

    /// Stamped into every event as `instance_id`.
    #[serde(default = "default_instance_id")]
    pub instance_id: String,

    /// Zone used for day boundaries. Uses IANA names (e.g. "Europe/Berlin").
    #[serde(default = "default_timezone")]
    pub timezone: Tz,

    /// One stream is started per listed frequency.
    #[serde(default = "default_frequencies")]
    pub frequencies: Vec<Frequency>,

    /// Slots between each scheduler and its engine.
    #[serde(default = "default_tick_capacity")]
    pub tick_capacity: usize,

    /// Slots in each stream's event buffer.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Fallback filter directive when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ProducerConfig {
    /// Loads the config from `path` (if any) and the environment.
    pub fn load(path: Option<&Path>) -> ChronoResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("CHRONOSTREAM").separator("__"))
            .build()?;
        let config: ProducerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document without consulting the environment.
    pub fn from_toml(source: &str) -> ChronoResult<Self> {
        let config: ProducerConfig = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ChronoResult<()> {
        if self.tick_capacity == 0 {
            return Err(ChronoError::ZeroCapacity("tick channel"));
        }
        if self.buffer_capacity == 0 {
            return Err(ChronoError::ZeroCapacity("event buffer"));
        }
        for frequency in &self.frequencies {
            frequency.supported()?;
        }
        Ok(())
    }
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            producer_version: default_producer_version(),
            instance_id: default_instance_id(),
            timezone: default_timezone(),
            frequencies: default_frequencies(),
            tick_capacity: default_tick_capacity(),
            buffer_capacity: default_buffer_capacity(),
            log_level: default_log_level(),
        }
    }
}

// --- Default value functions for serde ---

fn default_producer_version() -> String {
    crate::VERSION.to_string()
}

fn default_instance_id() -> String {
    "local".to_string()
}

fn default_timezone() -> Tz {
    Tz::UTC
}

fn default_frequencies() -> Vec<Frequency> {
    vec![Frequency::Second]
}

fn default_tick_capacity() -> usize {
    1
}

fn default_buffer_capacity() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}
