//! # Supervisor: owns worker threads, their channels and their lifecycle.
//!
//! The [`Supervisor`] is an explicitly owned registry (no process-wide singleton). It
//! spawns each worker on a named OS thread with its own runtime, holds the host end of
//! the worker's channel, and tracks the worker's state as seen from the host.
//!
//! ## State machine
//! ```text
//!   spawn ──► Starting ──WorkerReady──► Running ──shutdown──► Stopping ──exit──► Stopped
//!                │                         │                     │
//!                └──── setup failure ──────┴─── fault / panic ───┴──────────► Failed
//! ```
//!
//! The host side never shares state with a worker thread. Transitions driven by the
//! worker (`Running`, `Stopped`, `Failed`) are applied when the poller observes the
//! worker's lifecycle events; transitions driven by the host (`Stopping`, forced
//! `Stopped`) are applied directly. The exit latch carries the thread's outcome, so a
//! finished thread settles its worker even when no lifecycle event was observed.
//!
//! ## Rules
//! - Only the channel, the cancellation token and the exit latch cross threads
//! - `send` never waits; `shutdown` waits at most `deadline`
//! - A worker that misses its shutdown deadline is detached, logged as a leak, and
//!   reported with [`BridgeError::ShutdownTimeout`]
//! - Dropping the supervisor cancels every worker and closes every channel

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::channel::{self, Drained, HostEnd};
use crate::config::BridgeConfig;
use crate::envelope::{Envelope, Event, ExitOutcome, Fault, Kind};
use crate::error::BridgeError;
use crate::log_sink::LogSink;
use crate::supervisor::thread::{self, Launch};
use crate::worker::{WorkerId, WorkerSpec, WorkerState};

/// Host-side record of one worker.
struct Handle {
    name: Cow<'static, str>,
    state: WorkerState,
    channel: HostEnd,
    token: CancellationToken,
    join: Option<JoinHandle<()>>,
    exited: Receiver<ExitOutcome>,
    exit: Option<ExitOutcome>,
}

impl Handle {
    fn set_state(&mut self, worker: WorkerId, next: WorkerState) {
        if self.state == next {
            return;
        }
        if self.state.can_transition_to(next) {
            tracing::debug!(worker = %worker, name = %self.name, from = %self.state, to = %next, "worker state");
            self.state = next;
        } else {
            tracing::debug!(worker = %worker, from = %self.state, to = %next, "state transition ignored");
        }
    }

    /// Returns the thread's outcome once its body has finished. Never waits.
    fn check_exit(&mut self) -> Option<ExitOutcome> {
        if self.exit.is_none() {
            match self.exited.try_recv() {
                Ok(outcome) => self.exit = Some(outcome),
                Err(TryRecvError::Disconnected) => self.exit = Some(ExitOutcome::Failed),
                Err(TryRecvError::Empty) => {}
            }
        }
        self.exit
    }

    /// Moves a non-terminal worker to the state matching its thread's outcome.
    fn settle(&mut self, worker: WorkerId, outcome: ExitOutcome) {
        if self.state.is_terminal() {
            return;
        }
        let next = match outcome {
            ExitOutcome::Completed => WorkerState::Stopped,
            ExitOutcome::Failed => WorkerState::Failed,
        };
        tracing::debug!(worker = %worker, name = %self.name, from = %self.state, to = %next, "worker settled by exit latch");
        self.state = next;
    }

    /// Waits up to `wait` for the thread to finish; joins it on success.
    fn await_exit(&mut self, worker: WorkerId, wait: Duration) -> bool {
        let outcome = match self.exit {
            Some(outcome) => outcome,
            None => match self.exited.recv_timeout(wait) {
                Ok(outcome) => outcome,
                Err(RecvTimeoutError::Disconnected) => ExitOutcome::Failed,
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!(
                        worker = %worker,
                        name = %self.name,
                        waited = ?wait,
                        "worker ignored cancellation; thread detached (resource leak)"
                    );
                    self.join = None;
                    self.state = WorkerState::Stopped;
                    return false;
                }
            },
        };
        self.exit = Some(outcome);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                tracing::warn!(worker = %worker, "worker thread ended with a panic");
            }
        }
        self.settle(worker, outcome);
        true
    }

    fn begin_stop(&mut self, worker: WorkerId) {
        self.token.cancel();
        self.channel.close_inbound();
        if !self.state.is_terminal() {
            self.set_state(worker, WorkerState::Stopping);
        }
    }

    fn needs_wait(&self) -> bool {
        self.join.is_some()
    }
}

/// Owner of all worker threads of one bridge.
pub struct Supervisor {
    cfg: BridgeConfig,
    sink: Option<Arc<LogSink>>,
    root: CancellationToken,
    next_id: u64,
    workers: BTreeMap<WorkerId, Handle>,
}

impl Supervisor {
    /// Creates a supervisor; opens the log sink when `cfg.log_path` is set.
    pub fn new(cfg: BridgeConfig) -> Result<Self, BridgeError> {
        let sink = match &cfg.log_path {
            Some(path) => Some(Arc::new(LogSink::open(path)?)),
            None => None,
        };
        Ok(Self::build(cfg, sink))
    }

    /// Creates a supervisor sharing an already open log sink.
    pub fn with_sink(cfg: BridgeConfig, sink: Arc<LogSink>) -> Self {
        Self::build(cfg, Some(sink))
    }

    fn build(cfg: BridgeConfig, sink: Option<Arc<LogSink>>) -> Self {
        Self {
            cfg,
            sink,
            root: CancellationToken::new(),
            next_id: 0,
            workers: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.cfg
    }

    pub fn sink(&self) -> Option<&Arc<LogSink>> {
        self.sink.as_ref()
    }

    /// Starts a worker thread for `spec`; the worker begins in `Starting`.
    ///
    /// # Errors
    /// `Io` when the OS refuses to create the thread (nothing is registered then).
    pub fn spawn(&mut self, spec: WorkerSpec) -> Result<WorkerId, BridgeError> {
        let worker = WorkerId::new(self.next_id + 1);
        let capacity = spec
            .capacity()
            .map_or_else(|| self.cfg.capacity_clamped(), |c| c.max(1));
        let overflow = spec.overflow().unwrap_or(self.cfg.overflow);
        let (name, factory) = spec.into_parts();

        let (host, inbox, outbox) = channel::pair(capacity, overflow, self.cfg.send_wait);
        let token = self.root.child_token();
        let (exit_tx, exit_rx) = mpsc::sync_channel(1);

        let launch = Launch {
            worker,
            factory,
            inbox,
            outbox,
            token: token.clone(),
            sink: self.sink.clone(),
            runtime_threads: self.cfg.runtime_threads(),
        };
        let join = thread::spawn(self.cfg.thread_name(worker), launch, exit_tx)?;
        self.next_id += 1;

        tracing::info!(worker = %worker, name = %name, capacity, ?overflow, "worker spawned");
        self.workers.insert(
            worker,
            Handle {
                name,
                state: WorkerState::Starting,
                channel: host,
                token,
                join: Some(join),
                exited: exit_rx,
                exit: None,
            },
        );
        Ok(worker)
    }

    /// Enqueues a command for a `Running` worker without waiting.
    ///
    /// # Errors
    /// - `UnknownWorker` if `worker` was never spawned or has been disposed
    /// - `MalformedEnvelope` if `env` is not a correlated `Command`
    /// - `WorkerUnavailable` if the worker is not `Running`
    /// - `ChannelFull` if the worker's inbound queue is at capacity
    pub fn send(&self, worker: WorkerId, env: Envelope) -> Result<(), BridgeError> {
        let handle = self.handle(worker)?;
        if env.kind() != Kind::Command || env.correlation_id().is_none() {
            return Err(BridgeError::malformed(format!(
                "only correlated commands can be sent to a worker, got {}",
                env.kind()
            )));
        }
        if handle.state != WorkerState::Running {
            return Err(BridgeError::WorkerUnavailable {
                worker,
                state: handle.state,
            });
        }
        handle.channel.send(env)
    }

    /// Returns the host-side state of `worker`.
    pub fn state(&self, worker: WorkerId) -> Option<WorkerState> {
        self.workers.get(&worker).map(|h| h.state)
    }

    /// Returns the name `worker` was spawned with.
    pub fn name(&self, worker: WorkerId) -> Option<&str> {
        self.workers.get(&worker).map(|h| h.name.as_ref())
    }

    /// Lists every registered worker with its state, ordered by id.
    pub fn list(&self) -> Vec<(WorkerId, WorkerState)> {
        self.workers.iter().map(|(id, h)| (*id, h.state)).collect()
    }

    /// Returns the ids of every registered worker.
    pub fn ids(&self) -> Vec<WorkerId> {
        self.workers.keys().copied().collect()
    }

    /// Takes everything `worker` has produced so far. Never waits.
    pub(crate) fn drain(&self, worker: WorkerId) -> Result<Drained, BridgeError> {
        Ok(self.handle(worker)?.channel.drain())
    }

    /// Returns the outcome of `worker`'s thread if it has finished. Never waits.
    ///
    /// Checked before draining: a finished thread has already queued its exit report.
    pub(crate) fn exit_outcome(&mut self, worker: WorkerId) -> Result<Option<ExitOutcome>, BridgeError> {
        Ok(self.handle_mut(worker)?.check_exit())
    }

    /// Settles a worker whose thread finished without its exit report being observed.
    ///
    /// Returns the uncorrelated fault to deliver when the thread failed.
    pub(crate) fn settle_exit(&mut self, worker: WorkerId, outcome: ExitOutcome) -> Option<Envelope> {
        let handle = self.workers.get_mut(&worker)?;
        if handle.state.is_terminal() {
            return None;
        }
        tracing::warn!(worker = %worker, name = %handle.name, ?outcome, "worker thread ended without an exit report");
        handle.settle(worker, outcome);
        match outcome {
            ExitOutcome::Completed => None,
            ExitOutcome::Failed => Some(Envelope::fault(Fault::new(
                "worker_fault",
                format!("worker {worker} thread ended without an exit report"),
            ))),
        }
    }

    /// Applies the state change carried by a lifecycle event.
    pub(crate) fn observe(&mut self, worker: WorkerId, env: &Envelope) {
        let next = match env.event_payload() {
            Some(Event::WorkerReady) => WorkerState::Running,
            Some(Event::WorkerExited {
                outcome: ExitOutcome::Completed,
            }) => WorkerState::Stopped,
            Some(Event::WorkerExited {
                outcome: ExitOutcome::Failed,
            }) => WorkerState::Failed,
            Some(Event::Notice { .. }) | None => return,
        };
        if let Some(handle) = self.workers.get_mut(&worker) {
            handle.set_state(worker, next);
        }
    }

    /// Cancels `worker` and waits up to `deadline` for its thread to finish.
    ///
    /// # Errors
    /// - `UnknownWorker` if `worker` is not registered
    /// - `ShutdownTimeout` if the thread did not finish in time; the thread is detached
    ///   and the worker is marked `Stopped` anyway
    pub fn shutdown(&mut self, worker: WorkerId, deadline: Duration) -> Result<(), BridgeError> {
        let handle = self.handle_mut(worker)?;
        if !handle.needs_wait() {
            return Ok(());
        }
        handle.begin_stop(worker);
        if handle.await_exit(worker, deadline) {
            tracing::info!(worker = %worker, state = %handle.state, "worker shut down");
            Ok(())
        } else {
            Err(BridgeError::ShutdownTimeout {
                deadline,
                workers: vec![worker],
            })
        }
    }

    /// Shuts every worker down within the configured `shutdown_deadline`.
    pub fn shutdown_all_default(&mut self) -> Result<(), BridgeError> {
        self.shutdown_all(self.cfg.shutdown_deadline)
    }

    /// Cancels every worker, then waits for all of them within one shared `deadline`.
    ///
    /// A `deadline` too large to express as an instant waits without limit.
    ///
    /// # Errors
    /// `ShutdownTimeout` listing every worker that missed the deadline.
    pub fn shutdown_all(&mut self, deadline: Duration) -> Result<(), BridgeError> {
        let until = Instant::now().checked_add(deadline);
        for (id, handle) in self.workers.iter_mut() {
            if handle.needs_wait() {
                handle.begin_stop(*id);
            }
        }

        let mut stuck = Vec::new();
        for (id, handle) in self.workers.iter_mut() {
            if !handle.needs_wait() {
                continue;
            }
            let left = until.map_or(deadline, |u| u.saturating_duration_since(Instant::now()));
            if !handle.await_exit(*id, left) {
                stuck.push(*id);
            }
        }

        if stuck.is_empty() {
            Ok(())
        } else {
            Err(BridgeError::ShutdownTimeout {
                deadline,
                workers: stuck,
            })
        }
    }

    /// Forgets `worker` without waiting: cancels it, closes its channel, detaches its thread.
    pub fn dispose(&mut self, worker: WorkerId) -> Result<(), BridgeError> {
        let handle = self
            .workers
            .remove(&worker)
            .ok_or(BridgeError::UnknownWorker { worker })?;
        handle.token.cancel();
        tracing::debug!(worker = %worker, name = %handle.name, state = %handle.state, "worker disposed");
        Ok(())
    }

    fn handle(&self, worker: WorkerId) -> Result<&Handle, BridgeError> {
        self.workers
            .get(&worker)
            .ok_or(BridgeError::UnknownWorker { worker })
    }

    fn handle_mut(&mut self, worker: WorkerId) -> Result<&mut Handle, BridgeError> {
        self.workers
            .get_mut(&worker)
            .ok_or(BridgeError::UnknownWorker { worker })
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.root.cancel();
        if !self.workers.is_empty() {
            tracing::debug!(workers = self.workers.len(), "supervisor dropped; workers cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread::sleep;

    use super::*;
    use crate::envelope::{Command, Reply};
    use crate::error::TaskError;
    use crate::worker::{Task, WorkerIo};

    const WAIT: Duration = Duration::from_secs(5);

    /// Drains and observes until `worker` reaches `want`; returns everything drained.
    fn pump_until(sup: &mut Supervisor, worker: WorkerId, want: WorkerState) -> Vec<Envelope> {
        let until = Instant::now() + WAIT;
        let mut seen = Vec::new();
        while Instant::now() < until {
            for env in sup.drain(worker).unwrap().items {
                sup.observe(worker, &env);
                seen.push(env);
            }
            if sup.state(worker) == Some(want) {
                return seen;
            }
            sleep(Duration::from_millis(2));
        }
        panic!("worker {worker} never reached {want}, stuck at {:?}", sup.state(worker));
    }

    /// Task type for factories that panic before producing one.
    struct Never;

    #[async_trait::async_trait]
    impl Task for Never {
        async fn run(self: Box<Self>, _io: WorkerIo) -> Result<(), TaskError> {
            Ok(())
        }
    }

    fn pong_worker() -> WorkerSpec {
        WorkerSpec::from_fn("pong", |mut io: WorkerIo| async move {
            while let Some(cmd) = io.next().await {
                io.reply(&cmd, Reply::Pong).await?;
            }
            Ok::<_, TaskError>(())
        })
    }

    #[test]
    fn worker_becomes_running_and_answers() {
        let mut sup = Supervisor::new(BridgeConfig::default()).unwrap();
        let id = sup.spawn(pong_worker()).unwrap();
        assert_eq!(sup.name(id), Some("pong"));
        pump_until(&mut sup, id, WorkerState::Running);

        let cmd = Envelope::new_command(Command::Ping);
        let cid = cmd.correlation_id().unwrap();
        sup.send(id, cmd).unwrap();

        let until = Instant::now() + WAIT;
        let reply = loop {
            if let Some(env) = sup.drain(id).unwrap().items.into_iter().next() {
                break env;
            }
            assert!(Instant::now() < until);
            sleep(Duration::from_millis(2));
        };
        assert!(reply.is_response_to(cid));

        sup.shutdown(id, WAIT).unwrap();
        assert_eq!(sup.state(id), Some(WorkerState::Stopped));
    }

    #[test]
    fn send_checks_kind_and_state() {
        let mut sup = Supervisor::new(BridgeConfig::default()).unwrap();
        let id = sup.spawn(WorkerSpec::from_fn("slow", |io: WorkerIo| async move {
            io.token().cancelled().await;
            Ok::<_, TaskError>(())
        }))
        .unwrap();

        let err = sup
            .send(id, Envelope::event(Event::WorkerReady))
            .unwrap_err();
        assert_eq!(err.as_label(), "malformed_envelope");

        let missing = WorkerId::new(999);
        let err = sup
            .send(missing, Envelope::new_command(Command::Ping))
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnknownWorker { worker } if worker == missing));

        sup.shutdown(id, WAIT).unwrap();
        let err = sup.send(id, Envelope::new_command(Command::Ping)).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::WorkerUnavailable {
                state: WorkerState::Stopped,
                ..
            }
        ));
    }

    #[test]
    fn factory_panic_fails_only_that_worker() {

        let mut sup = Supervisor::new(BridgeConfig::default()).unwrap();
        let bad = sup
            .spawn(WorkerSpec::new("bad", || -> Never { panic!("factory exploded") }))
            .unwrap();
        let good = sup.spawn(pong_worker()).unwrap();

        let seen = pump_until(&mut sup, bad, WorkerState::Failed);
        let faults: Vec<_> = seen.iter().filter_map(Envelope::error).collect();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].code, "worker_fault");
        assert!(faults[0].message.contains("factory exploded"));

        pump_until(&mut sup, good, WorkerState::Running);
        sup.shutdown_all(WAIT).unwrap();
    }

    #[test]
    fn setup_error_is_reported_with_its_label() {
        struct NoSetup;

        #[async_trait::async_trait]
        impl Task for NoSetup {
            async fn setup(&mut self, _io: &mut WorkerIo) -> Result<(), TaskError> {
                Err(TaskError::Fatal {
                    error: "no config".into(),
                })
            }
            async fn run(self: Box<Self>, _io: WorkerIo) -> Result<(), TaskError> {
                unreachable!("run after failed setup")
            }
        }

        let mut sup = Supervisor::new(BridgeConfig::default()).unwrap();
        let id = sup.spawn(WorkerSpec::new("no-setup", || NoSetup)).unwrap();
        let seen = pump_until(&mut sup, id, WorkerState::Failed);

        let fault = seen.iter().find_map(Envelope::error).unwrap();
        assert_eq!(fault.code, "task_fatal");
        assert!(fault.message.starts_with("setup: "));
        assert!(!seen.iter().any(|e| matches!(e.event_payload(), Some(Event::WorkerReady))));
    }

    fn wait_exit(sup: &mut Supervisor, worker: WorkerId) -> ExitOutcome {
        let until = Instant::now() + WAIT;
        loop {
            if let Some(outcome) = sup.exit_outcome(worker).unwrap() {
                return outcome;
            }
            assert!(Instant::now() < until, "worker {worker} thread never finished");
            sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn exit_latch_settles_worker_without_its_report() {
        let mut sup = Supervisor::new(BridgeConfig::default()).unwrap();
        let done = sup
            .spawn(WorkerSpec::from_fn("done", |_io: WorkerIo| async move {
                Ok::<_, TaskError>(())
            }))
            .unwrap();
        let broken = sup
            .spawn(WorkerSpec::new("broken", || -> Never { panic!("gone") }))
            .unwrap();

        assert_eq!(wait_exit(&mut sup, done), ExitOutcome::Completed);
        assert!(sup.settle_exit(done, ExitOutcome::Completed).is_none());
        assert_eq!(sup.state(done), Some(WorkerState::Stopped));

        assert_eq!(wait_exit(&mut sup, broken), ExitOutcome::Failed);
        let fault = sup.settle_exit(broken, ExitOutcome::Failed).unwrap();
        assert_eq!(fault.error().map(|f| f.code.as_str()), Some("worker_fault"));
        assert!(fault.correlation_id().is_none());
        assert_eq!(sup.state(broken), Some(WorkerState::Failed));

        assert!(sup.settle_exit(broken, ExitOutcome::Failed).is_none());
    }

    #[test]
    fn dispose_forgets_worker() {
        let mut sup = Supervisor::new(BridgeConfig::default()).unwrap();
        let id = sup.spawn(pong_worker()).unwrap();
        sup.dispose(id).unwrap();

        assert_eq!(sup.state(id), None);
        assert!(sup.list().is_empty());
        assert!(matches!(
            sup.dispose(id),
            Err(BridgeError::UnknownWorker { .. })
        ));
    }
}
