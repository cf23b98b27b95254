//! The bounded, lossy hand-off between the engine and whatever drains it.
//!
//! Offers never wait for space. When the buffer is full the offer is refused
//! and the caller decides what to do; the engine simply drops the event. The
//! read side is exposed through [`EventReceiver`], which can drain but can
//! neither enqueue nor close.

use crate::error::{ChronoError, ChronoResult};
use crate::events::Event;
use crossbeam_queue::ArrayQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Notify;
use tracing::debug;

/// The write side of an event buffer, as seen by the engine.
pub trait Buffer: Send + Sync {
    /// Enqueues without blocking. Returns `false` if the buffer is full or
    /// closed.
    fn offer(&self, event: Event) -> bool;

    /// Number of events currently buffered.
    fn len(&self) -> usize;

    /// Fixed capacity.
    fn cap(&self) -> usize;

    /// Marks the buffer closed. Only the first call has an effect and returns
    /// `true`; buffered events stay drainable.
    fn close(&self) -> bool;

    fn is_closed(&self) -> bool;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Shared {
    queue: ArrayQueue<Event>,
    closed: AtomicBool,
    // Offers hold it shared, close holds it exclusively: once `close` returns,
    // no accepted offer can still be pushing.
    gate: RwLock<()>,
    notify: Notify,
}

/// A fixed-capacity multi-producer, multi-consumer event queue.
#[derive(Clone)]
pub struct EventBuffer {
    shared: Arc<Shared>,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> ChronoResult<Self> {
        if capacity == 0 {
            return Err(ChronoError::ZeroCapacity("event buffer"));
        }
        Ok(Self {
            shared: Arc::new(Shared {
                queue: ArrayQueue::new(capacity),
                closed: AtomicBool::new(false),
                gate: RwLock::new(()),
                notify: Notify::new(),
            }),
        })
    }

    /// Returns a read-only handle for draining the buffer.
    pub fn events(&self) -> EventReceiver {
        EventReceiver {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Buffer for EventBuffer {
    fn offer(&self, event: Event) -> bool {
        let pushed = {
            let _open = self.shared.gate.read().unwrap_or_else(PoisonError::into_inner);
            !self.shared.closed.load(Ordering::Acquire) && self.shared.queue.push(event).is_ok()
        };
        if pushed {
            self.shared.notify.notify_waiters();
        }
        pushed
    }

    fn len(&self) -> usize {
        self.shared.queue.len()
    }

    fn cap(&self) -> usize {
        self.shared.queue.capacity()
    }

    fn close(&self) -> bool {
        let first = {
            let _sealed = self.shared.gate.write().unwrap_or_else(PoisonError::into_inner);
            !self.shared.closed.swap(true, Ordering::AcqRel)
        };
        if first {
            debug!(remaining = self.shared.queue.len(), "event buffer closed");
            self.shared.notify.notify_waiters();
        }
        first
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

/// Egress-only view of an [`EventBuffer`].
#[derive(Clone)]
pub struct EventReceiver {
    shared: Arc<Shared>,
}

impl EventReceiver {
    /// Waits for the next event. Returns `None` once the buffer is closed and
    /// fully drained.
    pub async fn recv(&self) -> Option<Event> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            // Register interest before checking so an offer racing with the
            // checks below still wakes us.
            notified.as_mut().enable();

            if let Some(event) = self.shared.queue.pop() {
                return Some(event);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                return self.shared.queue.pop();
            }
            notified.await;
        }
    }

    /// Takes the next event if one is buffered.
    pub fn try_recv(&self) -> Option<Event> {
        self.shared.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.queue.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Frequency;
    use crate::events::build;
    use std::time::Duration;

    fn event(sequence: u64) -> Event {
        build(Frequency::Second, 1_000, sequence, "v1.0", "test")
    }

    #[test]
    fn rejects_zero_capacity() {
        assert!(matches!(
            EventBuffer::new(0),
            Err(ChronoError::ZeroCapacity(_))
        ));
    }

    #[test]
    fn full_buffer_refuses_until_drained() {
        let buffer = EventBuffer::new(1).unwrap();
        let events = buffer.events();
        assert!(buffer.offer(event(1)));
        assert!(!buffer.offer(event(2)));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.cap(), 1);

        assert_eq!(events.try_recv().map(|e| e.sequence), Some(1));
        assert!(buffer.offer(event(2)));
        assert_eq!(events.try_recv().map(|e| e.sequence), Some(2));
        assert!(events.try_recv().is_none());
    }

    #[test]
    fn close_takes_effect_once() {
        let buffer = EventBuffer::new(4).unwrap();
        assert!(buffer.close());
        assert!(!buffer.close());
        assert!(buffer.is_closed());
        assert!(!buffer.offer(event(1)));
    }

    #[test]
    fn nothing_lands_after_close_returns() {
        let buffer = EventBuffer::new(1 << 16).unwrap();
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let buffer = buffer.clone();
                std::thread::spawn(move || {
                    let mut accepted = 0usize;
                    for sequence in 1..=10_000 {
                        if !buffer.offer(event(sequence)) {
                            break;
                        }
                        accepted += 1;
                    }
                    accepted
                })
            })
            .collect();

        while buffer.is_empty() {
            std::thread::yield_now();
        }
        assert!(buffer.close());
        let at_close = buffer.len();

        let accepted: usize = writers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(buffer.len(), at_close);
        assert_eq!(accepted, at_close);
    }

    #[tokio::test]
    async fn closed_buffer_still_drains() {
        let buffer = EventBuffer::new(4).unwrap();
        let events = buffer.events();
        buffer.offer(event(1));
        buffer.offer(event(2));
        buffer.close();

        assert_eq!(events.recv().await.map(|e| e.sequence), Some(1));
        assert_eq!(events.recv().await.map(|e| e.sequence), Some(2));
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test]
    async fn recv_wakes_on_offer_and_close() {
        let buffer = EventBuffer::new(2).unwrap();
        let events = buffer.events();
        let reader = tokio::spawn(async move {
            let first = events.recv().await;
            let second = events.recv().await;
            (first, second)
        });

        tokio::task::yield_now().await;
        buffer.offer(event(9));
        tokio::task::yield_now().await;
        buffer.close();

        let (first, second) = tokio::time::timeout(Duration::from_millis(500), reader)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.map(|e| e.sequence), Some(9));
        assert_eq!(second, None);
    }
}
