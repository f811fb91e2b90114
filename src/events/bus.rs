//! # Runtime event bus.
//!
//! Every component of a run reports what it does by publishing an [`Event`]
//! on one shared [`Bus`]: the orchestrator (resolution, shutdown), the
//! constructor, the service manager, the cascade controller and the subscriber
//! workers themselves. The orchestrator holds the one receiver that forwards
//! events into the [`SubscriberSet`](crate::SubscriberSet).
//!
//! Publishing never waits. The bus keeps the last `capacity` events; a receiver
//! further behind than that sees `RecvError::Lagged` and loses the oldest ones.
//! Nothing is kept when nobody listens.
//!
//! Events here are for observation. State the manager must not miss travels on
//! its own channel, never on the bus.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
///
/// Clones publish into the same channel and draw from the same sequence, so
/// `seq` orders events across every publisher of one run.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
    /// Next sequence number; held across the send so receivers see `seq` in order.
    seq: Arc<Mutex<u64>>,
}

impl Bus {
    /// Bus retaining up to `capacity` events (at least 1), shared by all receivers.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self {
            tx,
            seq: Arc::new(Mutex::new(1)),
        }
    }

    /// Stamps `ev` with the next sequence number and broadcasts it.
    pub fn publish(&self, mut ev: Event) {
        let mut next = self.seq.lock();
        ev.seq = *next;
        *next += 1;
        let _ = self.tx.send(ev);
    }

    /// New receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_sequence_is_monotonic_per_bus() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let clone = bus.clone();

        bus.publish(Event::new(EventKind::ManagerHealthy));
        clone.publish(Event::new(EventKind::ManagerStopped));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(first.seq < second.seq);
        assert_eq!(second.kind, EventKind::ManagerStopped);

        let other = Bus::new(16);
        let mut other_rx = other.subscribe();
        other.publish(Event::new(EventKind::ManagerHealthy));
        assert_eq!(other_rx.recv().await.unwrap().seq, 1);
    }

    #[test]
    fn test_concurrent_publishers_deliver_in_seq_order() {
        let bus = Bus::new(1024);
        let mut rx = bus.subscribe();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let bus = bus.clone();
                scope.spawn(move || {
                    for _ in 0..200 {
                        bus.publish(Event::new(EventKind::ServiceRunning));
                    }
                });
            }
        });

        let mut last = 0;
        let mut count = 0;
        while let Ok(ev) = rx.try_recv() {
            assert!(ev.seq > last, "seq {} after {}", ev.seq, last);
            last = ev.seq;
            count += 1;
        }
        assert_eq!(count, 800);
    }

    #[test]
    fn test_publish_without_receivers_is_noop() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::ShutdownRequested));
    }
}
