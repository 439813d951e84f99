//! # Channel ends.
//!
//! [`pair`] creates one worker's channel: an inbound queue (host → worker) and an
//! outbound queue (worker → host), and hands out the three ends.
//!
//! ```text
//!            HostEnd                                  worker thread
//!  send ──────────────► [inbound queue]  ───────────► Inbox::recv
//!  drain ◄────────────  [outbound queue] ◄─────────── Outbox::send (cloneable)
//! ```
//!
//! ## Rules
//! - **Host never waits**: [`HostEnd::send`] fails with `ChannelFull` on a full inbound
//!   queue; [`HostEnd::drain`] swaps the outbound buffer out
//! - **Closing**: dropping the `HostEnd` closes both directions; worker sends then fail
//!   with `ChannelClosed` and `Inbox::recv` returns `None` once the inbound queue is empty

use std::sync::Arc;
use std::time::Duration;

use crate::channel::queue::{Overflow, Queue};
use crate::envelope::Envelope;
use crate::error::BridgeError;

/// Creates the channel of one worker.
pub(crate) fn pair(
    capacity: usize,
    overflow: Overflow,
    send_wait: Duration,
) -> (HostEnd, Inbox, Outbox) {
    let inbound = Arc::new(Queue::new(capacity, Overflow::Block, Duration::ZERO));
    let outbound = Arc::new(Queue::new(capacity, overflow, send_wait));
    (
        HostEnd {
            inbound: Arc::clone(&inbound),
            outbound: Arc::clone(&outbound),
        },
        Inbox { queue: inbound },
        Outbox { queue: outbound },
    )
}

/// Everything a poll took out of the outbound queue.
#[derive(Debug, Default)]
pub(crate) struct Drained {
    pub items: Vec<Envelope>,
    pub dropped_total: u64,
}

/// Host side of a worker's channel; owned by the supervisor.
pub(crate) struct HostEnd {
    inbound: Arc<Queue>,
    outbound: Arc<Queue>,
}

impl HostEnd {
    /// Enqueues a command for the worker without waiting.
    pub(crate) fn send(&self, env: Envelope) -> Result<(), BridgeError> {
        self.inbound.try_push(env)
    }

    /// Takes everything the worker has produced so far.
    pub(crate) fn drain(&self) -> Drained {
        let (items, dropped_total) = self.outbound.drain();
        Drained {
            items,
            dropped_total,
        }
    }

    /// Stops accepting commands; the worker still sees what is already queued.
    pub(crate) fn close_inbound(&self) {
        self.inbound.close();
    }

    #[cfg(test)]
    pub(crate) fn pending_inbound(&self) -> usize {
        self.inbound.len()
    }
}

impl Drop for HostEnd {
    fn drop(&mut self) {
        self.inbound.close();
        self.outbound.close();
    }
}

/// Worker side receiver of commands.
pub struct Inbox {
    queue: Arc<Queue>,
}

impl Inbox {
    /// Waits for the next command; `None` once the host closed the channel and it is empty.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.queue.pop().await
    }

    /// Returns the next queued command without waiting.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.queue.try_pop()
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

/// Worker side sender; clone it freely across the worker's internal tasks.
#[derive(Clone)]
pub struct Outbox {
    queue: Arc<Queue>,
}

impl Outbox {
    /// Sends an envelope, waiting asynchronously for space when the overflow policy requires it.
    ///
    /// # Errors
    /// - `ChannelFull` after waiting `send_wait` without space
    /// - `BackpressureDrop` when a lossy envelope was discarded instead
    /// - `ChannelClosed` once the host end is gone
    pub async fn send(&self, env: Envelope) -> Result<(), BridgeError> {
        self.queue.push(env).await
    }

    /// Sends without waiting.
    pub fn try_send(&self, env: Envelope) -> Result<(), BridgeError> {
        self.queue.try_push(env)
    }

    /// Sends a worker's final exit report, beyond capacity if needed.
    ///
    /// Never waits; fails only once the host end is gone.
    pub(crate) fn send_final(&self, env: Envelope) -> Result<(), BridgeError> {
        self.queue.push_reserved(env)
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{Command, Event, Reply};

    #[test]
    fn host_send_fails_fast_when_inbound_full() {
        let (host, _inbox, _outbox) = pair(2, Overflow::DropOldest, Duration::from_secs(1));
        host.send(Envelope::new_command(Command::Ping)).unwrap();
        host.send(Envelope::new_command(Command::Ping)).unwrap();

        let err = host.send(Envelope::new_command(Command::Ping)).unwrap_err();
        assert_eq!(err.as_label(), "channel_full");
        assert_eq!(host.pending_inbound(), 2);
    }

    #[tokio::test]
    async fn fifo_in_both_directions() {
        let (host, mut inbox, outbox) = pair(8, Overflow::Block, Duration::ZERO);
        let cmds: Vec<_> = (0..3).map(|_| Envelope::new_command(Command::Ping)).collect();
        for c in &cmds {
            host.send(c.clone()).unwrap();
        }
        for c in &cmds {
            let got = inbox.recv().await.unwrap();
            let id = got.correlation_id().unwrap();
            assert_eq!(Some(id), c.correlation_id());
            outbox.send(Envelope::result_for(id, Reply::Pong)).await.unwrap();
        }

        let drained = host.drain();
        assert_eq!(drained.items.len(), 3);
        for (res, cmd) in drained.items.iter().zip(&cmds) {
            assert!(res.is_response_to(cmd.correlation_id().unwrap()));
        }
        assert!(host.drain().items.is_empty());
    }

    #[tokio::test]
    async fn dropping_host_end_closes_worker_side() {
        let (host, mut inbox, outbox) = pair(4, Overflow::DropOldest, Duration::ZERO);
        host.send(Envelope::new_command(Command::Stop)).unwrap();
        drop(host);

        assert!(inbox.recv().await.is_some());
        assert!(inbox.recv().await.is_none());
        assert!(outbox.is_closed());
        assert!(matches!(
            outbox.send(Envelope::event(Event::WorkerReady)).await,
            Err(BridgeError::ChannelClosed)
        ));
    }

    #[test]
    fn worker_try_send_reports_full_without_waiting() {
        let (host, _inbox, outbox) = pair(1, Overflow::Block, Duration::from_secs(5));
        outbox.try_send(Envelope::event(Event::WorkerReady)).unwrap();
        let err = outbox.try_send(Envelope::event(Event::WorkerReady)).unwrap_err();
        assert_eq!(err.as_label(), "channel_full");

        let drained = host.drain();
        assert_eq!(drained.items.len(), 1);
        assert_eq!(drained.dropped_total, 0);
    }
}
