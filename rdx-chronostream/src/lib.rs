//! # Chronostream
//!
//! A deterministic, wall-clock-aligned tick producer for Rust.
//!
//! Chronostream fires exactly on calendar boundaries (every second, minute,
//! hour or day), turns each firing into an immutable, reproducible event with
//! a per-frequency sequence number, and hands it to a bounded, lossy buffer
//! for an external transport to drain.
//!
//! ## Core Concepts
//!
//! - **TimeSource**: The injected clock. Production uses the system clock; tests
//!   use a `SimulatedClock` that only moves when told to.
//! - **Scheduler**: Computes the next boundary from the live clock on every
//!   iteration, so it never drifts, and never blocks on a slow consumer.
//! - **Engine**: Wires one scheduler to a sequencer, the event builder and a
//!   buffer.
//! - **Producer**: The composition root that runs one engine per configured
//!   frequency from a `ProducerConfig`.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use chronostream::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ProducerConfig::default();
//!     let mut producer = Producer::from_config(config, Arc::new(SystemTimeSource::new()))?;
//!
//!     let id = producer.stream_for(Frequency::Second).expect("second stream");
//!     let events = producer.events(id).expect("stream exists");
//!     tokio::spawn(async move {
//!         while let Some(event) = events.recv().await {
//!             println!("{} seq={}", event.id, event.sequence);
//!         }
//!     });
//!
//!     tokio::signal::ctrl_c().await?;
//!     producer.shutdown().await;
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Chronostream";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod common;
pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod producer;
pub mod time;

/// A prelude module for easy importing of the most common Chronostream types.
pub mod prelude {
    pub use crate::common::{Frequency, StreamId};
    pub use crate::components::buffer::{Buffer, EventBuffer, EventReceiver};
    pub use crate::components::scheduler::{next_boundary, ClockScheduler, Scheduler};
    pub use crate::components::sequencer::{FrequencySequencer, Sequencer};
    pub use crate::config::ProducerConfig;
    pub use crate::engine::Engine;
    pub use crate::error::{ChronoError, ChronoResult};
    pub use crate::events::{build, Event, Tick, SCHEMA_VERSION};
    pub use crate::producer::{Producer, StreamStatus};
    pub use crate::time::{SimulatedClock, SystemTimeSource, TimeSource, Timer};
}
