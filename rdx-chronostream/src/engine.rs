//! The lifecycle coordinator that wires one scheduler to its event buffer.

use crate::components::buffer::Buffer;
use crate::components::scheduler::Scheduler;
use crate::components::sequencer::Sequencer;
use crate::events::{self, Tick};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// Composes a scheduler, a sequencer and a buffer into a running pipeline.
///
/// The engine owns no timing, sequencing or event-construction logic. It
/// receives ticks, asks the sequencer for the next number, builds the event
/// and offers it to the buffer. Events refused by a full buffer are dropped;
/// nothing pushes back on the scheduler.
pub struct Engine {
    scheduler: Box<dyn Scheduler>,
    sequencer: Arc<dyn Sequencer>,
    buffer: Arc<dyn Buffer>,
    producer_version: String,
    instance_id: String,
}

impl Engine {
    pub fn new(
        scheduler: Box<dyn Scheduler>,
        sequencer: Arc<dyn Sequencer>,
        buffer: Arc<dyn Buffer>,
        producer_version: impl Into<String>,
        instance_id: impl Into<String>,
    ) -> Self {
        let producer_version = producer_version.into();
        let instance_id = instance_id.into();
        info!(
            frequency = %scheduler.frequency(),
            buffer_capacity = buffer.cap(),
            %producer_version,
            %instance_id,
            "creating engine"
        );
        Self {
            scheduler,
            sequencer,
            buffer,
            producer_version,
            instance_id,
        }
    }

    /// Starts the scheduler and the coordination loop.
    ///
    /// Both subscribe to `shutdown`; a message on it, or dropping every
    /// sender, stops them. Ticks already turned into events stay in the
    /// buffer. The returned handle completes when the coordination loop exits.
    pub fn start(self, shutdown: &broadcast::Sender<()>) -> JoinHandle<()> {
        let Engine {
            scheduler,
            sequencer,
            buffer,
            producer_version,
            instance_id,
        } = self;
        let frequency = scheduler.frequency();
        let ticks = scheduler.start(shutdown.subscribe());
        let coordinator = Coordinator {
            sequencer,
            buffer,
            producer_version,
            instance_id,
        };
        info!(%frequency, "engine starting up");
        tokio::spawn(coordinator.run(ticks, shutdown.subscribe()))
    }
}

struct Coordinator {
    sequencer: Arc<dyn Sequencer>,
    buffer: Arc<dyn Buffer>,
    producer_version: String,
    instance_id: String,
}

impl Coordinator {
    async fn run(self, mut ticks: mpsc::Receiver<Tick>, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    debug!("engine received shutdown");
                    break;
                }
                tick = ticks.recv() => match tick {
                    Some(tick) => self.process_tick(tick),
                    None => {
                        debug!("tick stream ended");
                        break;
                    }
                },
            }
        }
    }

    fn process_tick(&self, tick: Tick) {
        let sequence = self.sequencer.next(tick.frequency);
        let event = events::build(
            tick.frequency,
            tick.scheduled_time,
            sequence,
            &self.producer_version,
            &self.instance_id,
        );
        trace!(id = %event.id, "event built");
        if !self.buffer.offer(event) {
            debug!(
                frequency = %tick.frequency,
                sequence,
                depth = self.buffer.len(),
                "buffer refused event, dropping"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Frequency;
    use crate::components::buffer::EventBuffer;
    use crate::components::sequencer::FrequencySequencer;
    use std::time::Duration;

    /// Replays a fixed list of ticks, then waits for shutdown.
    struct ScriptedScheduler {
        frequency: Frequency,
        script: Vec<Tick>,
    }

    impl Scheduler for ScriptedScheduler {
        fn frequency(&self) -> Frequency {
            self.frequency
        }

        fn start(self: Box<Self>, mut shutdown: broadcast::Receiver<()>) -> mpsc::Receiver<Tick> {
            let (tx, rx) = mpsc::channel(self.script.len().max(1));
            for tick in self.script {
                let _ = tx.try_send(tick);
            }
            tokio::spawn(async move {
                let _ = shutdown.recv().await;
                drop(tx);
            });
            rx
        }
    }

    fn scripted(count: i64) -> Box<dyn Scheduler> {
        Box::new(ScriptedScheduler {
            frequency: Frequency::Minute,
            script: (0..count)
                .map(|i| Tick::new(Frequency::Minute, i * 60_000_000_000))
                .collect(),
        })
    }

    #[tokio::test]
    async fn events_follow_tick_order() {
        let buffer = EventBuffer::new(8).unwrap();
        let events = buffer.events();
        let engine = Engine::new(
            scripted(3),
            Arc::new(FrequencySequencer::new()),
            Arc::new(buffer),
            "v1.0",
            "02905",
        );
        let (shutdown, _) = broadcast::channel(1);
        let _handle = engine.start(&shutdown);

        for (expected_sequence, expected_ts) in [(1, 0), (2, 60_000_000_000), (3, 120_000_000_000)] {
            let event = tokio::time::timeout(Duration::from_millis(500), events.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(event.sequence, expected_sequence);
            assert_eq!(event.timestamp, expected_ts);
            assert_eq!(event.frequency, Frequency::Minute);
            assert_eq!(event.producer_version, "v1.0");
            assert_eq!(event.instance_id, "02905");
        }
    }

    #[tokio::test]
    async fn full_buffer_drops_without_stalling() {
        let buffer = EventBuffer::new(1).unwrap();
        let events = buffer.events();
        let sequencer = Arc::new(FrequencySequencer::new());
        let engine = Engine::new(
            scripted(4),
            sequencer.clone(),
            Arc::new(buffer),
            "v1.0",
            "02905",
        );
        let (shutdown, _) = broadcast::channel(1);
        let handle = engine.start(&shutdown);

        while sequencer.current(Frequency::Minute) < 4 {
            tokio::task::yield_now().await;
        }
        shutdown.send(()).unwrap();
        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events.try_recv().map(|e| e.sequence), Some(1));
    }

    #[tokio::test]
    async fn shutdown_ends_the_coordination_loop() {
        let buffer = EventBuffer::new(4).unwrap();
        let engine = Engine::new(
            scripted(0),
            Arc::new(FrequencySequencer::new()),
            Arc::new(buffer),
            "v1.0",
            "02905",
        );
        let (shutdown, _) = broadcast::channel(1);
        let handle = engine.start(&shutdown);
        shutdown.send(()).unwrap();
        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .expect("coordination loop did not exit")
            .unwrap();
    }
}
