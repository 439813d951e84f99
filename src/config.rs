//! # Bridge configuration.
//!
//! Provides [`BridgeConfig`], centralized settings for the supervisor, channels and poller.
//!
//! Config is used in two ways:
//! 1. **Bridge creation**: `Bridge::new(config)` / `Supervisor::new(config)`
//! 2. **Worker defaults**: a [`WorkerSpec`](crate::WorkerSpec) without overrides inherits
//!    channel capacity and overflow policy from the config.
//!
//! ## Sentinel values
//! - `send_wait = 0s` → producers never wait on a full channel
//! - `command_timeout = 0s` → commands have no host-side timeout
//! - `worker_threads = 0` → each worker runs a current-thread runtime

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::channel::Overflow;

/// Global configuration for the bridge.
///
/// ## Field semantics
/// - `channel_capacity`: per-direction queue size (min 1; clamped)
/// - `overflow`: what happens to lossy traffic when the worker→host queue is full
/// - `send_wait`: how long a worker producer waits for space before `ChannelFull`
/// - `command_timeout`: default host-side timeout for outstanding commands
/// - `shutdown_deadline`: deadline used by `shutdown_all_default`
/// - `worker_threads`: size of each worker's runtime (`0` = current-thread)
/// - `thread_name_prefix`: OS thread name prefix for worker threads
/// - `log_path`: file backing the durable [`LogSink`](crate::LogSink), if any
///
/// Deserializes from a partial document; missing fields take their defaults.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Capacity of each direction of a worker's channel.
    pub channel_capacity: usize,

    /// Overflow policy for the worker→host direction.
    pub overflow: Overflow,

    /// Maximum time a worker producer waits for channel space.
    pub send_wait: Duration,

    /// Default host-side timeout for commands sent through the poller.
    pub command_timeout: Duration,

    /// Deadline for cooperative shutdown of every worker (`shutdown_all_default`).
    pub shutdown_deadline: Duration,

    /// Number of runtime threads per worker (`0` = current-thread runtime).
    pub worker_threads: usize,

    /// Prefix for worker OS thread names; the worker id is appended.
    pub thread_name_prefix: String,

    /// Path of the durable diagnostic log file.
    pub log_path: Option<PathBuf>,
}

impl BridgeConfig {
    /// Returns the channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn capacity_clamped(&self) -> usize {
        self.channel_capacity.max(1)
    }

    /// Returns the default command timeout as an `Option`.
    ///
    /// - `None` → commands wait for their response indefinitely
    /// - `Some(d)` → the poller expires the command after `d`
    #[inline]
    pub fn default_command_timeout(&self) -> Option<Duration> {
        if self.command_timeout == Duration::ZERO {
            None
        } else {
            Some(self.command_timeout)
        }
    }

    /// Returns the number of multi-thread runtime workers, or `None` for a current-thread runtime.
    #[inline]
    pub fn runtime_threads(&self) -> Option<usize> {
        match self.worker_threads {
            0 => None,
            n => Some(n),
        }
    }

    /// Builds the OS thread name for a worker.
    pub(crate) fn thread_name(&self, worker: impl std::fmt::Display) -> String {
        format!("{}-{worker}", self.thread_name_prefix)
    }
}

impl Default for BridgeConfig {
    /// Default configuration:
    ///
    /// - `channel_capacity = 256`
    /// - `overflow = Overflow::DropOldest`
    /// - `send_wait = 1s`
    /// - `command_timeout = 0s` (none)
    /// - `shutdown_deadline = 5s`
    /// - `worker_threads = 0` (current-thread runtime)
    /// - `thread_name_prefix = "tickbridge-worker"`
    /// - `log_path = None`
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            overflow: Overflow::default(),
            send_wait: Duration::from_secs(1),
            command_timeout: Duration::ZERO,
            shutdown_deadline: Duration::from_secs(5),
            worker_threads: 0,
            thread_name_prefix: "tickbridge-worker".to_string(),
            log_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_map_to_none() {
        let cfg = BridgeConfig {
            channel_capacity: 0,
            ..BridgeConfig::default()
        };
        assert_eq!(cfg.capacity_clamped(), 1);
        assert_eq!(cfg.default_command_timeout(), None);
        assert_eq!(cfg.runtime_threads(), None);
        assert_eq!(cfg.thread_name(7), "tickbridge-worker-7");
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let cfg: BridgeConfig = serde_json::from_str(
            r#"{ "channel_capacity": 8, "overflow": "block", "worker_threads": 2 }"#,
        )
        .unwrap();
        assert_eq!(cfg.channel_capacity, 8);
        assert_eq!(cfg.overflow, Overflow::Block);
        assert_eq!(cfg.runtime_threads(), Some(2));
        assert_eq!(cfg.send_wait, Duration::from_secs(1));
        assert!(cfg.log_path.is_none());
    }
}
