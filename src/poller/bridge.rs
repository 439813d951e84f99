//! # Bridge: the host-facing, non-blocking entry point.
//!
//! [`Bridge`] owns the [`Supervisor`], the table of outstanding commands and an
//! optional host listener. The host calls [`Bridge::poll`] once per tick from its own
//! thread; nothing in the poll path waits.
//!
//! ## Dispatch
//! ```text
//! poll(worker)
//!   read exit latch (before draining: a finished thread has queued its report)
//!   drain outbound queue (swap under lock)
//!     for each envelope, in enqueue order:
//!       observe lifecycle event ──► supervisor state
//!       Result/Error + known id ──► continuation | PollResult      (id no longer outstanding)
//!       Result/Error + unknown id ► warn + drop                    (unmatched += 1)
//!       Event / Log / fault ──────► listener | PollResult
//!   thread finished, no report seen ► settle state (+ Error{worker_fault} if failed)
//!   overdue commands ─────────────► synthetic Error{command_timeout}
//!   worker exited ────────────────► synthetic Error{worker_exited} for what is left
//! ```
//!
//! Every envelope is delivered to at most one receiver, exactly once.
//!
//! ## Example
//! ```rust,no_run
//! use tickbridge::{Bridge, BridgeConfig, Command, PingService, ServiceSet, WorkerSpec};
//!
//! let mut bridge = Bridge::new(BridgeConfig::default())?;
//! let worker = bridge.spawn(WorkerSpec::new("services", || {
//!     ServiceSet::new().with(PingService::new())
//! }))?;
//!
//! // host tick callback:
//! for env in bridge.poll(worker)? {
//!     println!("{:?}", env.body());
//! }
//! if bridge.state(worker) == Some(tickbridge::WorkerState::Running) {
//!     bridge.send(worker, Command::Ping)?;
//! }
//! # Ok::<(), tickbridge::BridgeError>(())
//! ```

use std::time::{Duration, Instant};

use crate::config::BridgeConfig;
use crate::envelope::{Command, CorrelationId, Envelope, Fault, Kind};
use crate::error::BridgeError;
use crate::log_sink::{Level, LogRecord};
use crate::poller::pending::{Continuation, Outstanding, Pending};
use crate::poller::PollResult;
use crate::supervisor::Supervisor;
use crate::worker::{WorkerId, WorkerSpec, WorkerState};

type Listener = Box<dyn FnMut(WorkerId, Envelope)>;

/// Host-side bridge. Use from the host's tick thread only.
pub struct Bridge {
    supervisor: Supervisor,
    pending: Pending,
    listener: Option<Listener>,
}

impl Bridge {
    /// Creates a bridge with a fresh supervisor.
    pub fn new(cfg: BridgeConfig) -> Result<Self, BridgeError> {
        Ok(Self::from_supervisor(Supervisor::new(cfg)?))
    }

    pub fn from_supervisor(supervisor: Supervisor) -> Self {
        Self {
            supervisor,
            pending: Pending::default(),
            listener: None,
        }
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Starts a worker; see [`Supervisor::spawn`].
    pub fn spawn(&mut self, spec: WorkerSpec) -> Result<WorkerId, BridgeError> {
        self.supervisor.spawn(spec)
    }

    pub fn state(&self, worker: WorkerId) -> Option<WorkerState> {
        self.supervisor.state(worker)
    }

    pub fn list(&self) -> Vec<(WorkerId, WorkerState)> {
        self.supervisor.list()
    }

    /// Routes unsolicited traffic (events, logs, uncorrelated faults) to `listener`
    /// instead of the [`PollResult`].
    pub fn set_listener<F>(&mut self, listener: F)
    where
        F: FnMut(WorkerId, Envelope) + 'static,
    {
        self.listener = Some(Box::new(listener));
    }

    pub fn clear_listener(&mut self) {
        self.listener = None;
    }

    /// Sends `command` to `worker` with the configured default timeout.
    ///
    /// The response arrives in a later [`PollResult`].
    pub fn send(&mut self, worker: WorkerId, command: Command) -> Result<CorrelationId, BridgeError> {
        let timeout = self.supervisor.config().default_command_timeout();
        self.submit(worker, command, timeout, None)
    }

    /// Sends `command` and hands its response to `continuation` during a later poll.
    ///
    /// `timeout = None` uses the configured default. An expired command's continuation
    /// receives a synthetic `Error{code: "command_timeout"}`.
    pub fn send_with<F>(
        &mut self,
        worker: WorkerId,
        command: Command,
        timeout: Option<Duration>,
        continuation: F,
    ) -> Result<CorrelationId, BridgeError>
    where
        F: FnOnce(Envelope) + 'static,
    {
        let timeout = timeout.or_else(|| self.supervisor.config().default_command_timeout());
        self.submit(worker, command, timeout, Some(Box::new(continuation)))
    }

    fn submit(
        &mut self,
        worker: WorkerId,
        command: Command,
        timeout: Option<Duration>,
        continuation: Option<Continuation>,
    ) -> Result<CorrelationId, BridgeError> {
        let env = Envelope::new_command(command);
        let id = env
            .correlation_id()
            .ok_or_else(|| BridgeError::malformed("command without correlation id"))?;
        self.supervisor.send(worker, env)?;
        self.pending.insert(
            id,
            Outstanding {
                worker,
                timeout,
                issued: Instant::now(),
                continuation,
            },
        );
        Ok(id)
    }

    /// Returns `true` while `id` awaits its response.
    pub fn is_outstanding(&self, id: CorrelationId) -> bool {
        self.pending.contains(id)
    }

    /// Number of commands awaiting a response, across all workers.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Drains and dispatches whatever `worker` has produced. Never waits.
    pub fn poll(&mut self, worker: WorkerId) -> Result<PollResult, BridgeError> {
        let finished = self.supervisor.exit_outcome(worker)?;
        let drained = self.supervisor.drain(worker)?;
        let mut out = PollResult::new(worker, drained.dropped_total);

        for env in drained.items {
            self.supervisor.observe(worker, &env);
            self.dispatch(worker, env, &mut out);
        }

        if let Some(outcome) = finished {
            if let Some(fault) = self.supervisor.settle_exit(worker, outcome) {
                self.dispatch(worker, fault, &mut out);
            }
        }

        for (id, entry) in self.pending.take_overdue(worker, Instant::now()) {
            out.note_expired();
            let waited = entry.timeout.unwrap_or_default();
            self.host_log(
                Level::Warn,
                format!("command {id} to worker {worker} expired after {waited:?}"),
            );
            let fault = Fault::new("command_timeout", format!("no response within {waited:?}"));
            resolve(entry, Envelope::error_for(id, fault), &mut out);
        }

        if self.supervisor.state(worker).is_some_and(WorkerState::is_terminal) {
            for (id, entry) in self.pending.take_worker(worker) {
                let fault = Fault::new("worker_exited", format!("worker {worker} exited"));
                resolve(entry, Envelope::error_for(id, fault), &mut out);
            }
        }
        Ok(out)
    }

    /// Polls every registered worker, in id order.
    pub fn poll_all(&mut self) -> Vec<PollResult> {
        let mut results = Vec::new();
        for worker in self.supervisor.ids() {
            match self.poll(worker) {
                Ok(res) => results.push(res),
                Err(e) => tracing::debug!(worker = %worker, error = %e, "poll skipped"),
            }
        }
        results
    }

    /// Shuts `worker` down cooperatively; see [`Supervisor::shutdown`].
    ///
    /// The worker's final envelopes stay queued for the next poll.
    pub fn shutdown(&mut self, worker: WorkerId, deadline: Duration) -> Result<(), BridgeError> {
        let res = self.supervisor.shutdown(worker, deadline);
        if let Err(e @ BridgeError::ShutdownTimeout { .. }) = &res {
            self.host_log(Level::Warn, e.to_string());
        }
        res
    }

    /// Shuts every worker down within one shared `deadline`.
    pub fn shutdown_all(&mut self, deadline: Duration) -> Result<(), BridgeError> {
        let res = self.supervisor.shutdown_all(deadline);
        if let Err(e @ BridgeError::ShutdownTimeout { .. }) = &res {
            self.host_log(Level::Warn, e.to_string());
        }
        res
    }

    /// Shuts every worker down within the configured `shutdown_deadline`.
    pub fn shutdown_all_default(&mut self) -> Result<(), BridgeError> {
        let deadline = self.supervisor.config().shutdown_deadline;
        self.shutdown_all(deadline)
    }

    /// Forgets `worker` without waiting.
    ///
    /// Continuations of its outstanding commands receive a synthetic
    /// `Error{code: "worker_disposed"}` immediately; anything still queued is discarded.
    pub fn dispose(&mut self, worker: WorkerId) -> Result<(), BridgeError> {
        self.supervisor.dispose(worker)?;
        for (id, entry) in self.pending.take_worker(worker) {
            if let Some(k) = entry.continuation {
                let fault = Fault::new("worker_disposed", format!("worker {worker} disposed"));
                k(Envelope::error_for(id, fault));
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, worker: WorkerId, env: Envelope, out: &mut PollResult) {
        match (env.kind(), env.correlation_id()) {
            (Kind::Result | Kind::Error, Some(id)) => match self.pending.take(worker, id) {
                Some(entry) => resolve(entry, env, out),
                None => {
                    out.note_unmatched();
                    self.host_log(
                        Level::Warn,
                        format!("unmatched {} {id} from worker {worker} dropped", env.kind()),
                    );
                }
            },
            (Kind::Error | Kind::Event | Kind::Log, None) => match self.listener.as_mut() {
                Some(listener) => listener(worker, env),
                None => out.push(env),
            },
            (Kind::Command, _) | (Kind::Result, None) | (Kind::Event | Kind::Log, Some(_)) => {
                out.note_unmatched();
                self.host_log(
                    Level::Warn,
                    format!("{} envelope from worker {worker} breaks correlation rules; dropped", env.kind()),
                );
            }
        }
    }

    fn host_log(&self, level: Level, text: String) {
        let record = LogRecord::host(level, text);
        record.trace();
        if let Some(sink) = self.supervisor.sink() {
            if let Err(e) = sink.emit(&record) {
                tracing::debug!(error = %e, "log sink write failed");
            }
        }
    }
}

fn resolve(entry: Outstanding, env: Envelope, out: &mut PollResult) {
    match entry.continuation {
        Some(k) => k(env),
        None => out.push(env),
    }
}
