//! Contains the building blocks of the tick pipeline.
//!
//! Each component sits behind a trait so the engine can be composed from real
//! or scripted parts: the scheduler turns a clock into ticks, the sequencer
//! numbers them and the buffer holds the resulting events for egress.

pub mod buffer;
pub mod scheduler;
pub mod sequencer;
