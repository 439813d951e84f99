//! # Service host task.
//!
//! [`ServiceSet`] runs a group of [`Service`]s inside one worker.
//!
//! ```text
//! setup ─► start_all ──(error)──► stop the started ones, fail the worker
//! run:
//!   next() ─► Stop ─────────────► stop_all ─► reply Stopped ─► exit
//!         ─► other command ─────► first service returning Some(reply) ─► reply
//!                                  none ─► Error{code: "unhandled_command"}
//!         ─► None (cancelled) ──► stop_all ─► exit
//! ```

use async_trait::async_trait;

use crate::envelope::{Command, Fault, Reply};
use crate::error::TaskError;
use crate::services::Service;
use crate::worker::{Task, WorkerIo, WorkerLog};

/// Ordered group of services hosted by one worker.
#[derive(Default)]
pub struct ServiceSet {
    services: Vec<Box<dyn Service>>,
    started: usize,
}

impl ServiceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the set with `service` appended.
    pub fn with(mut self, service: impl Service) -> Self {
        self.add(service);
        self
    }

    pub fn add(&mut self, service: impl Service) {
        self.services.push(Box::new(service));
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name()).collect()
    }

    /// Starts services in order. On failure, services already started are stopped.
    pub async fn start_all(&mut self, log: &WorkerLog) -> Result<(), TaskError> {
        log.info(format!("starting {} services", self.services.len()));
        for i in self.started..self.services.len() {
            if let Err(e) = self.services[i].start(log).await {
                log.error(format!(
                    "service {} failed to start: {e}",
                    self.services[i].name()
                ));
                self.stop_all(log).await;
                return Err(e);
            }
            self.started = i + 1;
        }
        Ok(())
    }

    /// Stops started services in reverse order; failures are logged.
    pub async fn stop_all(&mut self, log: &WorkerLog) {
        let started = std::mem::take(&mut self.started);
        for service in self.services[..started].iter_mut().rev() {
            if let Err(e) = service.stop(log).await {
                log.warn(format!("service {} failed to stop: {e}", service.name()));
            }
        }
        if started > 0 {
            log.info(format!("stopped {started} services"));
        }
    }

    /// Offers `command` to each service in order; the first answer wins.
    pub async fn route(&mut self, command: &Command, log: &WorkerLog) -> Option<Reply> {
        for service in self.services.iter_mut() {
            if let Some(reply) = service.handle(command, log).await {
                return Some(reply);
            }
        }
        None
    }
}

#[async_trait]
impl Task for ServiceSet {
    async fn setup(&mut self, io: &mut WorkerIo) -> Result<(), TaskError> {
        let log = io.log().clone();
        self.start_all(&log).await
    }

    async fn run(self: Box<Self>, mut io: WorkerIo) -> Result<(), TaskError> {
        let mut this = self;
        let log = io.log().clone();
        while let Some(env) = io.next().await {
            let Some(command) = env.command() else {
                continue;
            };
            if matches!(command, Command::Stop) {
                this.stop_all(&log).await;
                io.reply(&env, Reply::Stopped).await?;
                return Ok(());
            }
            match this.route(command, &log).await {
                Some(reply) => io.reply(&env, reply).await?,
                None => {
                    let fault = Fault::new(
                        "unhandled_command",
                        format!("no service handles {}", describe(command)),
                    );
                    io.fail(&env, fault).await?;
                }
            }
        }
        this.stop_all(&log).await;
        Ok(())
    }
}

fn describe(command: &Command) -> String {
    match command {
        Command::Ping => "ping".to_string(),
        Command::Stop => "stop".to_string(),
        Command::Invoke { op, .. } => format!("invoke `{op}`"),
    }
}
