//! # Worker thread body.
//!
//! Each worker runs on its own named OS thread with a private tokio runtime.
//!
//! ```text
//! thread::Builder::spawn ──► build runtime ──► block_on(
//!                                  │             catch_unwind(
//!                                  │               factory() → setup() → WorkerReady → run()
//!                                  │             )
//!                                  │             → [Error] + WorkerExited{outcome}
//!                                  │           )
//!                                  └─ build error → Error + WorkerExited{failed}
//! exit latch fires with the outcome when the thread body ends, on every path
//! ```
//!
//! The exit report (`Error` and `WorkerExited`) is appended past the channel's
//! capacity: a full queue never hides a worker's end from the host.
//!
//! ## Outcomes
//! - `Ok(())` or `Err(Canceled)` from `run` → `WorkerExited{completed}`
//! - any other task error → `Error{code: <label>}` + `WorkerExited{failed}`
//! - panic in factory, setup or run → `Error{code: "worker_fault"}` + `WorkerExited{failed}`
//!
//! **Warning**: `AssertUnwindSafe` is used; a task that panics while holding its own
//! `Arc<Mutex<T>>` leaves that state poisoned. Nothing in the bridge is shared that way.

use std::any::Any;
use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::mpsc::SyncSender;
use std::thread::{self, JoinHandle};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::channel::{Inbox, Outbox};
use crate::envelope::{Envelope, Event, ExitOutcome, Fault};
use crate::error::{BridgeError, TaskError};
use crate::log_sink::{Level, LogRecord, LogSink};
use crate::worker::{TaskFactory, WorkerId, WorkerIo};

/// Everything a worker thread takes ownership of.
pub(crate) struct Launch {
    pub worker: WorkerId,
    pub factory: TaskFactory,
    pub inbox: Inbox,
    pub outbox: Outbox,
    pub token: CancellationToken,
    pub sink: Option<Arc<LogSink>>,
    pub runtime_threads: Option<usize>,
}

/// Starts the worker thread; `exit` receives the outcome once the thread body has finished.
pub(crate) fn spawn(
    thread_name: String,
    launch: Launch,
    exit: SyncSender<ExitOutcome>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new().name(thread_name).spawn(move || {
        let worker = launch.worker;
        let mut latch = ExitLatch {
            tx: exit,
            outcome: ExitOutcome::Failed,
        };
        match std::panic::catch_unwind(AssertUnwindSafe(move || launch.run())) {
            Ok(outcome) => latch.outcome = outcome,
            Err(panic) => tracing::error!(
                worker = %worker,
                panic = %panic_message(&*panic),
                "worker thread panicked outside task isolation"
            ),
        }
    })
}

/// Sends the thread's outcome to the host on drop.
struct ExitLatch {
    tx: SyncSender<ExitOutcome>,
    outcome: ExitOutcome,
}

impl Drop for ExitLatch {
    fn drop(&mut self) {
        let _ = self.tx.try_send(self.outcome);
    }
}

/// Where a task failed before it could finish.
enum Failure {
    Setup(TaskError),
    Run(TaskError),
}

impl Launch {
    fn run(self) -> ExitOutcome {
        let Launch {
            worker,
            factory,
            inbox,
            outbox,
            token,
            sink,
            runtime_threads,
        } = self;

        let runtime = match build_runtime(runtime_threads) {
            Ok(rt) => rt,
            Err(e) => {
                let fault = BridgeError::WorkerFault {
                    worker,
                    reason: format!("runtime build failed: {e}"),
                };
                report_sink(sink.as_deref(), worker, &fault.to_string());
                tracing::error!(worker = %worker, error = %e, "worker runtime build failed");
                deliver(&outbox, worker, Envelope::fault(Fault::from(&fault)));
                deliver(
                    &outbox,
                    worker,
                    Envelope::event(Event::WorkerExited {
                        outcome: ExitOutcome::Failed,
                    }),
                );
                return ExitOutcome::Failed;
            }
        };

        let report = outbox.clone();
        let io = WorkerIo::new(worker, inbox, outbox, token, sink.clone());
        runtime.block_on(async move {
            let result = AssertUnwindSafe(lifecycle(factory, io)).catch_unwind().await;
            let (fault, outcome) = match result {
                Ok(Ok(())) | Ok(Err(Failure::Run(TaskError::Canceled))) => {
                    tracing::debug!(worker = %worker, "worker task completed");
                    (None, ExitOutcome::Completed)
                }
                Ok(Err(Failure::Setup(e))) => {
                    let fault = Fault::new(e.as_label(), format!("setup: {}", e.as_message()));
                    (Some(fault), ExitOutcome::Failed)
                }
                Ok(Err(Failure::Run(e))) => (Some(Fault::from(&e)), ExitOutcome::Failed),
                Err(panic) => {
                    let fault = BridgeError::WorkerFault {
                        worker,
                        reason: panic_message(&*panic),
                    };
                    (Some(Fault::from(&fault)), ExitOutcome::Failed)
                }
            };

            if let Some(fault) = fault {
                tracing::warn!(worker = %worker, code = %fault.code, message = %fault.message, "worker failed");
                report_sink(sink.as_deref(), worker, &format!("{}: {}", fault.code, fault.message));
                deliver(&report, worker, Envelope::fault(fault));
            }
            deliver(&report, worker, Envelope::event(Event::WorkerExited { outcome }));
            outcome
        })
    }
}

async fn lifecycle(factory: TaskFactory, mut io: WorkerIo) -> Result<(), Failure> {
    let mut task = factory();
    task.setup(&mut io).await.map_err(Failure::Setup)?;
    io.outbox()
        .send(Envelope::event(Event::WorkerReady))
        .await
        .map_err(|e| Failure::Run(e.into()))?;
    tracing::debug!(worker = %io.id(), "worker ready");
    task.run(io).await.map_err(Failure::Run)
}

fn build_runtime(threads: Option<usize>) -> io::Result<tokio::runtime::Runtime> {
    match threads {
        None => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build(),
        Some(n) => tokio::runtime::Builder::new_multi_thread()
            .worker_threads(n)
            .enable_all()
            .build(),
    }
}

fn deliver(outbox: &Outbox, worker: WorkerId, env: Envelope) {
    if let Err(e) = outbox.send_final(env) {
        tracing::debug!(worker = %worker, error = %e, "exit report not delivered");
    }
}

fn report_sink(sink: Option<&LogSink>, worker: WorkerId, text: &str) {
    if let Some(sink) = sink {
        let record = LogRecord::new(Some(worker), Level::Error, text);
        if let Err(e) = sink.emit(&record) {
            tracing::warn!(worker = %worker, error = %e, "log sink write failed");
        }
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
