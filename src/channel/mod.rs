//! Bounded, per-worker transport between the host thread and a worker thread.
//!
//! - [`Overflow`] the worker→host backpressure policy
//! - [`Inbox`] / [`Outbox`] the worker's ends
//! - `HostEnd` the host's end, owned by the supervisor

mod ends;
mod queue;

pub(crate) use ends::{Drained, HostEnd, pair};
pub use ends::{Inbox, Outbox};
pub use queue::Overflow;
