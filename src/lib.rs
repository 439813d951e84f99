//! # tickbridge
//!
//! **tickbridge** connects a single-threaded, non-blocking host loop (a GUI-style tick
//! callback that must never stall) with supervised background workers that run async
//! work on their own threads.
//!
//! The host only ever calls non-blocking operations once per tick; workers may wait on
//! their own I/O. The two sides exchange typed [`Envelope`]s through a bounded
//! per-worker channel and share no other state.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  host thread (tick loop)                         worker threads
//! ┌──────────────────────────────┐
//! │ Bridge                       │        ┌──────────────────────────────────┐
//! │  - pending commands          │        │ thread "tickbridge-worker-1"     │
//! │  - listener / continuations  │        │  tokio runtime                   │
//! │  - Supervisor                │  send  │   catch_unwind(                  │
//! │     ├─ worker 1: HostEnd ────┼───────►│     Task::setup → WorkerReady    │
//! │     │   state, token, join   │◄───────┼──── Task::run(WorkerIo)          │
//! │     └─ worker 2: HostEnd ──┐ │  poll  │   ) → [Error] + WorkerExited     │
//! └────────────────────────────┼─┘        └───────────────┬──────────────────┘
//!                              │                          │ WorkerLog
//!                              └──────► thread 2 ...      ▼
//!                                                   LogSink (file, flush per line)
//! ```
//!
//! ### Lifecycle
//! ```text
//! spawn ──► Starting ──WorkerReady──► Running ──shutdown──► Stopping ──exit──► Stopped
//!              └──── setup failure / panic / task error ───────────────────► Failed
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                          |
//! |-------------------|-----------------------------------------------------------------|---------------------------------------------|
//! | **Envelopes**     | Closed set of message kinds, strict JSON codec.                 | [`Envelope`], [`Command`], [`Reply`], [`Fault`], [`Event`] |
//! | **Polling**       | Per-tick, never-blocking drain and dispatch.                    | [`Bridge`], [`PollResult`]                  |
//! | **Supervision**   | Worker threads, runtimes, fault isolation, shutdown deadlines.  | [`Supervisor`], [`WorkerState`]             |
//! | **Workers**       | Define worker logic as a trait object or closure.               | [`Task`], [`TaskFn`], [`WorkerSpec`], [`WorkerIo`] |
//! | **Services**      | Several start/handle/stop services in one worker.               | [`Service`], [`ServiceSet`], [`PingService`] |
//! | **Diagnostics**   | Durable per-line log file usable from any thread.               | [`LogSink`], [`LogRecord`]                  |
//! | **Errors**        | Typed errors for the bridge and for worker tasks.               | [`BridgeError`], [`TaskError`]              |
//! | **Configuration** | Capacities, backpressure policy, timeouts, runtime shape.       | [`BridgeConfig`], [`Overflow`]              |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tickbridge::{Bridge, BridgeConfig, Command, PingService, Reply, ServiceSet, WorkerSpec, WorkerState};
//!
//! let mut bridge = Bridge::new(BridgeConfig::default())?;
//! let worker = bridge.spawn(WorkerSpec::new("services", || {
//!     ServiceSet::new().with(PingService::new())
//! }))?;
//!
//! let mut pongs = 0;
//! let mut sent = false;
//! for _tick in 0..5_000 {
//!     for env in bridge.poll(worker)? {
//!         if env.reply() == Some(&Reply::Pong) {
//!             pongs += 1;
//!         }
//!     }
//!     if !sent && bridge.state(worker) == Some(WorkerState::Running) {
//!         bridge.send(worker, Command::Ping)?;
//!         sent = true;
//!     }
//!     if pongs == 1 {
//!         break;
//!     }
//!     std::thread::sleep(Duration::from_millis(1));
//! }
//! assert_eq!(pongs, 1);
//!
//! bridge.shutdown(worker, Duration::from_secs(1))?;
//! # Ok::<(), tickbridge::BridgeError>(())
//! ```
mod channel;
mod config;
mod envelope;
mod error;
mod log_sink;
mod poller;
mod services;
mod supervisor;
mod worker;

pub mod logging;

// ---- Public re-exports ----

pub use channel::{Inbox, Outbox, Overflow};
pub use config::BridgeConfig;
pub use envelope::{
    Body, Command, CorrelationId, Event, Envelope, ExitOutcome, Fault, Kind, Reply, Timestamp,
    decode, encode, encode_line,
};
pub use error::{BridgeError, TaskError};
pub use log_sink::{Level, LogRecord, LogSink};
pub use poller::{Bridge, Continuation, PollResult};
pub use services::{PingService, Service, ServiceSet};
pub use supervisor::Supervisor;
pub use worker::{Task, TaskFactory, TaskFn, WorkerId, WorkerIo, WorkerLog, WorkerSpec, WorkerState};
