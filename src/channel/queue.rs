//! # Bounded envelope queue.
//!
//! One [`Queue`] carries one direction of a worker's channel. The state lives behind a
//! single `std::sync::Mutex` so the host can drain it without an async runtime; async
//! waiters park on [`Notify`].
//!
//! ## Offer outcomes
//! ```text
//! offer(env)
//!   ├─ closed ───────────────────────────────────► Closed
//!   ├─ room ─────────────────────────────────────► Queued
//!   ├─ full, DropOldest
//!   │     ├─ oldest lossy entry found → evict it ─► Evicted   (dropped += 1)
//!   │     ├─ only critical entries, env lossy ──► Discarded (dropped += 1)
//!   │     └─ only critical entries, env critical ► Full(env)  (caller may wait)
//!   └─ full, Block ──────────────────────────────► Full(env)  (caller may wait)
//! ```
//!
//! ## Rules
//! - Critical traffic is never dropped; only `Log` and `Event::Notice` are
//! - The drop counter only grows
//! - `drain` swaps the whole buffer out under the lock and never waits
//! - [`Queue::push_reserved`] ignores capacity; it carries a worker's final exit report

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Notify;

use crate::envelope::Envelope;
use crate::error::BridgeError;

/// What a full worker→host channel does with new traffic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Overflow {
    /// Every producer waits for space up to `send_wait`, then gets `ChannelFull`.
    Block,
    /// Any envelope arriving at a full queue evicts the oldest queued `Log` or
    /// `Notice`. With no lossy entry left, lossy traffic is discarded and critical
    /// traffic waits as under `Block`.
    #[default]
    DropOldest,
}

/// Result of a single non-waiting push attempt.
pub(crate) enum Offer {
    Queued,
    Evicted,
    Discarded { dropped: u64 },
    Full(Envelope),
    Closed,
}

#[derive(Default)]
struct State {
    items: VecDeque<Envelope>,
    closed: bool,
    dropped: u64,
}

pub(crate) struct Queue {
    capacity: usize,
    overflow: Overflow,
    send_wait: Duration,
    state: Mutex<State>,
    readable: Notify,
    writable: Notify,
}

impl Queue {
    pub(crate) fn new(capacity: usize, overflow: Overflow, send_wait: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            overflow,
            send_wait,
            state: Mutex::new(State::default()),
            readable: Notify::new(),
            writable: Notify::new(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pushes without waiting; a full queue reports `ChannelFull`.
    pub(crate) fn try_push(&self, env: Envelope) -> Result<(), BridgeError> {
        let offer = {
            let mut st = self.lock();
            self.offer_locked(&mut st, env)
        };
        self.settle(offer)
    }

    /// Pushes, waiting asynchronously up to `send_wait` while the queue is full.
    ///
    /// A `send_wait` too large to express as an instant waits without limit.
    pub(crate) async fn push(&self, mut env: Envelope) -> Result<(), BridgeError> {
        let deadline = tokio::time::Instant::now().checked_add(self.send_wait);
        loop {
            let notified = self.writable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let offer = {
                let mut st = self.lock();
                self.offer_locked(&mut st, env)
            };
            match offer {
                Offer::Full(back) => {
                    env = back;
                    if self.send_wait.is_zero() {
                        return Err(self.full());
                    }
                    match deadline {
                        Some(at) => {
                            if tokio::time::timeout_at(at, notified).await.is_err() {
                                return Err(self.full());
                            }
                        }
                        None => notified.await,
                    }
                }
                other => return self.settle(other),
            }
        }
    }

    /// Appends `env` even when the queue is full; fails only once closed.
    pub(crate) fn push_reserved(&self, env: Envelope) -> Result<(), BridgeError> {
        {
            let mut st = self.lock();
            if st.closed {
                return Err(BridgeError::ChannelClosed);
            }
            st.items.push_back(env);
        }
        self.readable.notify_one();
        Ok(())
    }

    /// Waits for the next entry; `None` once the queue is closed and empty.
    pub(crate) async fn pop(&self) -> Option<Envelope> {
        loop {
            let notified = self.readable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next = {
                let mut st = self.lock();
                match st.items.pop_front() {
                    Some(env) => Some(Some(env)),
                    None if st.closed => Some(None),
                    None => None,
                }
            };
            match next {
                Some(Some(env)) => {
                    self.wake_writers();
                    return Some(env);
                }
                Some(None) => return None,
                None => notified.await,
            }
        }
    }

    pub(crate) fn try_pop(&self) -> Option<Envelope> {
        let env = self.lock().items.pop_front();
        if env.is_some() {
            self.wake_writers();
        }
        env
    }

    /// Takes everything queued and the cumulative drop count.
    pub(crate) fn drain(&self) -> (Vec<Envelope>, u64) {
        let (items, dropped) = {
            let mut st = self.lock();
            (std::mem::take(&mut st.items), st.dropped)
        };
        if !items.is_empty() {
            self.wake_writers();
        }
        (items.into(), dropped)
    }

    pub(crate) fn close(&self) {
        self.lock().closed = true;
        self.readable.notify_waiters();
        self.wake_writers();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().items.len()
    }

    #[cfg(test)]
    pub(crate) fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    fn offer_locked(&self, st: &mut State, env: Envelope) -> Offer {
        if st.closed {
            return Offer::Closed;
        }
        if st.items.len() < self.capacity {
            st.items.push_back(env);
            return Offer::Queued;
        }
        if self.overflow == Overflow::Block {
            return Offer::Full(env);
        }
        match st.items.iter().position(Envelope::is_lossy) {
            Some(pos) => {
                st.dropped += 1;
                st.items.remove(pos);
                st.items.push_back(env);
                Offer::Evicted
            }
            None if env.is_lossy() => {
                st.dropped += 1;
                Offer::Discarded {
                    dropped: st.dropped,
                }
            }
            None => Offer::Full(env),
        }
    }

    fn settle(&self, offer: Offer) -> Result<(), BridgeError> {
        match offer {
            Offer::Queued | Offer::Evicted => {
                self.readable.notify_one();
                Ok(())
            }
            Offer::Discarded { dropped } => Err(BridgeError::BackpressureDrop { dropped }),
            Offer::Full(_) => Err(self.full()),
            Offer::Closed => Err(BridgeError::ChannelClosed),
        }
    }

    fn full(&self) -> BridgeError {
        BridgeError::ChannelFull {
            capacity: self.capacity,
        }
    }

    fn wake_writers(&self) {
        self.writable.notify_waiters();
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::envelope::{Command, Event, Fault};
    use crate::log_sink::{Level, LogRecord};

    fn notice(n: u64) -> Envelope {
        Envelope::event(Event::Notice {
            topic: "tick".into(),
            data: json!(n),
        })
    }

    fn seq(env: &Envelope) -> Option<u64> {
        match env.event_payload() {
            Some(Event::Notice { data, .. }) => data.as_u64(),
            _ => None,
        }
    }

    #[test]
    fn drop_oldest_keeps_most_recent_notices() {
        let q = Queue::new(4, Overflow::DropOldest, Duration::ZERO);
        for n in 0..10 {
            q.try_push(notice(n)).unwrap();
        }
        let (items, dropped) = q.drain();
        assert_eq!(dropped, 6);
        let kept: Vec<_> = items.iter().filter_map(seq).collect();
        assert_eq!(kept, vec![6, 7, 8, 9]);
    }

    #[test]
    fn lossy_eviction_spares_critical_entries() {
        let q = Queue::new(3, Overflow::DropOldest, Duration::ZERO);
        q.try_push(Envelope::fault(Fault::new("a", "first"))).unwrap();
        q.try_push(notice(1)).unwrap();
        q.try_push(Envelope::fault(Fault::new("b", "second"))).unwrap();

        q.try_push(Envelope::log(LogRecord::host(Level::Info, "x")))
            .unwrap();
        let (items, dropped) = q.drain();
        assert_eq!(dropped, 1);
        assert_eq!(items.len(), 3);
        assert!(items[0].error().is_some());
        assert!(items[1].error().is_some());
        assert!(items[2].log_record().is_some());
    }

    #[test]
    fn incoming_lossy_is_discarded_when_only_critical_queued() {
        let q = Queue::new(1, Overflow::DropOldest, Duration::ZERO);
        q.try_push(Envelope::fault(Fault::new("a", "kept"))).unwrap();

        let err = q.try_push(notice(1)).unwrap_err();
        assert!(matches!(err, BridgeError::BackpressureDrop { dropped: 1 }));

        let err = q.try_push(Envelope::fault(Fault::new("b", "c"))).unwrap_err();
        assert!(matches!(err, BridgeError::ChannelFull { capacity: 1 }));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn closed_queue_rejects_and_drain_still_works() {
        let q = Queue::new(2, Overflow::Block, Duration::ZERO);
        q.try_push(Envelope::new_command(Command::Ping)).unwrap();
        q.close();

        assert!(matches!(
            q.try_push(Envelope::new_command(Command::Ping)),
            Err(BridgeError::ChannelClosed)
        ));
        assert_eq!(q.drain().0.len(), 1);
        assert!(q.is_closed());
    }

    #[tokio::test]
    async fn block_waits_then_reports_full() {
        let q = Queue::new(1, Overflow::Block, Duration::from_millis(30));
        q.push(notice(0)).await.unwrap();

        let started = tokio::time::Instant::now();
        let err = q.push(notice(1)).await.unwrap_err();
        assert!(matches!(err, BridgeError::ChannelFull { .. }));
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(q.dropped(), 0);
    }

    #[tokio::test]
    async fn blocked_producer_resumes_after_drain() {
        let q = std::sync::Arc::new(Queue::new(1, Overflow::Block, Duration::from_secs(5)));
        q.push(notice(0)).await.unwrap();

        let producer = {
            let q = q.clone();
            tokio::spawn(async move { q.push(notice(1)).await })
        };
        tokio::task::yield_now().await;

        let (first, _) = q.drain();
        assert_eq!(first.len(), 1);
        producer.await.unwrap().unwrap();
        assert_eq!(q.try_pop().as_ref().and_then(seq), Some(1));
    }

    #[tokio::test]
    async fn pop_returns_none_after_close() {
        let q = std::sync::Arc::new(Queue::new(4, Overflow::Block, Duration::ZERO));
        let consumer = {
            let q = q.clone();
            tokio::spawn(async move { q.pop().await })
        };
        tokio::task::yield_now().await;
        q.close();
        assert!(consumer.await.unwrap().is_none());
    }

    #[test]
    fn critical_entry_evicts_oldest_lossy_when_full() {
        let q = Queue::new(3, Overflow::DropOldest, Duration::ZERO);
        q.try_push(Envelope::log(LogRecord::host(Level::Info, "old"))).unwrap();
        q.try_push(notice(1)).unwrap();
        q.try_push(Envelope::fault(Fault::new("a", "queued"))).unwrap();

        q.try_push(Envelope::fault(Fault::new("b", "arrives full"))).unwrap();
        let (items, dropped) = q.drain();
        assert_eq!(dropped, 1);
        assert_eq!(items.len(), 3);
        assert_eq!(seq(&items[0]), Some(1));
        assert_eq!(items[2].error().map(|f| f.code.as_str()), Some("b"));
    }

    #[test]
    fn reserved_push_ignores_capacity_until_closed() {
        let q = Queue::new(1, Overflow::Block, Duration::ZERO);
        q.try_push(Envelope::fault(Fault::new("a", "b"))).unwrap();
        q.push_reserved(Envelope::event(Event::WorkerExited {
            outcome: crate::envelope::ExitOutcome::Failed,
        }))
        .unwrap();
        assert_eq!(q.len(), 2);

        q.close();
        assert!(matches!(
            q.push_reserved(Envelope::event(Event::WorkerReady)),
            Err(BridgeError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn unbounded_send_wait_does_not_overflow() {
        let q = std::sync::Arc::new(Queue::new(1, Overflow::Block, Duration::MAX));
        q.push(notice(0)).await.unwrap();

        let producer = {
            let q = q.clone();
            tokio::spawn(async move { q.push(notice(1)).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(q.drain().0.len(), 1);
        producer.await.unwrap().unwrap();
        assert_eq!(q.len(), 1);
    }
}
