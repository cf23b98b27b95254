//! The composition root: one engine and buffer per configured frequency.
//!
//! A producer owns its streams in a `SlotMap` keyed by [`StreamId`]. Each
//! stream has its own shutdown channel so it can be removed on its own, while
//! all streams share a single sequencer and time source.

use crate::common::{Frequency, StreamId};
use crate::components::buffer::{Buffer, EventBuffer, EventReceiver};
use crate::components::scheduler::ClockScheduler;
use crate::components::sequencer::{FrequencySequencer, Sequencer};
use crate::config::ProducerConfig;
use crate::engine::Engine;
use crate::error::{ChronoError, ChronoResult};
use crate::time::TimeSource;
use slotmap::SlotMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

struct Stream {
    frequency: Frequency,
    buffer: EventBuffer,
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

/// Point-in-time view of a running stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStatus {
    pub id: StreamId,
    pub frequency: Frequency,
    pub len: usize,
    pub cap: usize,
}

pub struct Producer<T: TimeSource> {
    config: ProducerConfig,
    time_source: Arc<T>,
    sequencer: Arc<FrequencySequencer>,
    streams: SlotMap<StreamId, Stream>,
}

impl<T: TimeSource> Producer<T> {
    /// Validates `config` and builds a producer with no running streams.
    pub fn new(config: ProducerConfig, time_source: Arc<T>) -> ChronoResult<Self> {
        config.validate()?;
        info!(
            instance_id = %config.instance_id,
            producer_version = %config.producer_version,
            timezone = %config.timezone,
            "creating producer"
        );
        Ok(Self {
            config,
            time_source,
            sequencer: Arc::new(FrequencySequencer::new()),
            streams: SlotMap::with_key(),
        })
    }

    /// Builds a producer and starts one stream per configured frequency.
    pub fn from_config(config: ProducerConfig, time_source: Arc<T>) -> ChronoResult<Self> {
        let frequencies = config.frequencies.clone();
        let mut producer = Self::new(config, time_source)?;
        for frequency in frequencies {
            producer.add_stream(frequency)?;
        }
        Ok(producer)
    }

    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    /// Builds and starts a stream for `frequency`.
    ///
    /// Sequence numbers are per frequency, so running two streams of the same
    /// frequency would interleave their counters; that is refused.
    pub fn add_stream(&mut self, frequency: Frequency) -> ChronoResult<StreamId> {
        let frequency = frequency.supported()?;
        if self.streams.values().any(|s| s.frequency == frequency) {
            return Err(ChronoError::DuplicateStream(frequency));
        }

        let scheduler = ClockScheduler::with_timezone(
            frequency,
            Arc::clone(&self.time_source),
            self.config.tick_capacity,
            self.config.timezone,
        )?;
        let buffer = EventBuffer::new(self.config.buffer_capacity)?;
        let engine = Engine::new(
            Box::new(scheduler),
            self.sequencer.clone(),
            Arc::new(buffer.clone()),
            self.config.producer_version.clone(),
            self.config.instance_id.clone(),
        );

        let (shutdown, _) = broadcast::channel(1);
        let handle = engine.start(&shutdown);
        let id = self.streams.insert(Stream {
            frequency,
            buffer,
            shutdown,
            handle,
        });
        info!(?id, %frequency, "stream added");
        Ok(id)
    }

    /// Stops a stream, waits for its engine and closes its buffer.
    ///
    /// Events still buffered remain drainable through any receiver obtained
    /// earlier. Returns `false` if no such stream exists.
    pub async fn remove_stream(&mut self, id: StreamId) -> bool {
        match self.streams.remove(id) {
            Some(stream) => {
                Self::stop_stream(id, stream).await;
                true
            }
            None => false,
        }
    }

    /// Stops every stream.
    pub async fn shutdown(&mut self) {
        info!(streams = self.streams.len(), "producer shutting down");
        let ids: Vec<StreamId> = self.streams.keys().collect();
        for id in ids {
            if let Some(stream) = self.streams.remove(id) {
                Self::stop_stream(id, stream).await;
            }
        }
    }

    async fn stop_stream(id: StreamId, stream: Stream) {
        // No receivers left means both loops already exited.
        let _ = stream.shutdown.send(());
        if let Err(e) = stream.handle.await {
            error!(?id, "engine task failed: {}", e);
        }
        stream.buffer.close();
        info!(?id, frequency = %stream.frequency, "stream removed");
    }

    /// Read-only handle to a stream's events.
    pub fn events(&self, id: StreamId) -> Option<EventReceiver> {
        self.streams.get(id).map(|stream| stream.buffer.events())
    }

    pub fn stream_for(&self, frequency: Frequency) -> Option<StreamId> {
        self.streams
            .iter()
            .find(|(_, stream)| stream.frequency == frequency)
            .map(|(id, _)| id)
    }

    pub fn streams(&self) -> Vec<StreamStatus> {
        self.streams
            .iter()
            .map(|(id, stream)| StreamStatus {
                id,
                frequency: stream.frequency,
                len: stream.buffer.len(),
                cap: stream.buffer.cap(),
            })
            .collect()
    }

    /// Last sequence number handed out for `frequency`.
    pub fn last_sequence(&self, frequency: Frequency) -> u64 {
        self.sequencer.current(frequency)
    }
}
