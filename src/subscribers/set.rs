//! # Subscriber fan-out.
//!
//! [`SubscriberSet`] hands every event of a run to each registered
//! [`Subscribe`]r without ever waiting on one of them.
//!
//! ```text
//!               ┌─► slot "log-writer" : mpsc(cap) ─► worker ─► on_event()
//! emit(event) ──┼─► slot "metrics"    : mpsc(cap) ─► worker ─► on_event()
//!               └─► slot ...                                    │
//!                                                panic ◄────────┘
//!                                                  └─► Bus: SubscriberPanicked
//! ```
//!
//! - A slot whose queue is full (or whose worker is gone) loses that one
//!   event; the loss is counted and published as `SubscriberOverflow`.
//! - Each worker sees its events in emission order. Workers do not wait on
//!   one another.
//! - Panics in `on_event` are caught per event and the worker keeps going.
//!   The catch uses `AssertUnwindSafe`: a subscriber that panics while holding
//!   a lock may leave its own state half-updated.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::error::panic_message;
use crate::events::{Bus, Event};
use crate::subscribers::Subscribe;

/// One subscriber: its queue, its worker and how many events it missed.
struct Slot {
    name: &'static str,
    queue: mpsc::Sender<Arc<Event>>,
    worker: JoinHandle<()>,
    dropped: AtomicU64,
}

impl Slot {
    fn spawn(sub: Arc<dyn Subscribe>, bus: Bus) -> Self {
        let name = sub.name();
        let (queue, mut inbox) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));

        let worker = tokio::spawn(async move {
            while let Some(ev) = inbox.recv().await {
                let delivery = std::panic::AssertUnwindSafe(sub.on_event(&ev)).catch_unwind();
                if let Err(payload) = delivery.await {
                    bus.publish(Event::subscriber_panicked(name, panic_message(&*payload)));
                }
            }
        });

        Self {
            name,
            queue,
            worker,
            dropped: AtomicU64::new(0),
        }
    }

    /// Queues `ev`, or says why it could not.
    fn offer(&self, ev: &Arc<Event>) -> Option<&'static str> {
        match self.queue.try_send(Arc::clone(ev)) {
            Ok(()) => None,
            Err(TrySendError::Full(_)) => Some("full"),
            Err(TrySendError::Closed(_)) => Some("closed"),
        }
    }
}

/// Fan-out of runtime events to a fixed set of subscribers.
pub struct SubscriberSet {
    slots: Vec<Slot>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber; panics and overflows are reported on `bus`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let slots = subs
            .into_iter()
            .map(|sub| Slot::spawn(sub, bus.clone()))
            .collect();
        Self { slots, bus }
    }

    /// Queues `event` for every subscriber. Never waits.
    pub fn emit(&self, event: &Event) {
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Like [`emit`](Self::emit), for an already shared event.
    ///
    /// A lost `SubscriberOverflow` event is counted but not reported again.
    pub fn emit_arc(&self, event: Arc<Event>) {
        for slot in &self.slots {
            let Some(reason) = slot.offer(&event) else {
                continue;
            };
            slot.dropped.fetch_add(1, Ordering::Relaxed);
            if !event.is_subscriber_overflow() {
                self.bus.publish(Event::subscriber_overflow(slot.name, reason));
            }
        }
    }

    /// Events lost so far, per subscriber name.
    pub fn dropped(&self) -> Vec<(&'static str, u64)> {
        self.slots
            .iter()
            .map(|s| (s.name, s.dropped.load(Ordering::Relaxed)))
            .collect()
    }

    /// Closes every queue and waits until the workers delivered what was queued.
    pub async fn shutdown(self) {
        let workers: Vec<_> = self
            .slots
            .into_iter()
            .map(|slot| {
                drop(slot.queue);
                slot.worker
            })
            .collect();
        for worker in workers {
            let _ = worker.await;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }
}
