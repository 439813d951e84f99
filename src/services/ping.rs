use std::borrow::Cow;

use async_trait::async_trait;

use crate::envelope::{Command, Reply};
use crate::services::Service;
use crate::worker::WorkerLog;

/// Liveness service: answers `Ping` with `Pong`.
#[derive(Debug, Clone)]
pub struct PingService {
    name: Cow<'static, str>,
}

impl PingService {
    pub fn new() -> Self {
        Self::named("ping")
    }

    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for PingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Service for PingService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&mut self, command: &Command, log: &WorkerLog) -> Option<Reply> {
        match command {
            Command::Ping => {
                log.info(format!("{}: ping received", self.name));
                Some(Reply::Pong)
            }
            Command::Stop | Command::Invoke { .. } => None,
        }
    }
}
