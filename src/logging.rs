//! # Process-wide `tracing` initialisation.
//!
//! The host application may not expose stderr to anything a developer can read, so
//! [`init`] can direct the bridge's own diagnostics to a file instead.
//!
//! Filtering follows `RUST_LOG`; without it everything at `info` and above is kept.
//! Installing twice fails with [`BridgeError::LoggingInit`] instead of panicking.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::BridgeError;

/// Where `tracing` output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// Appends to the given file (created if missing), without ANSI colours.
    File(PathBuf),
}

/// Installs the global `tracing` subscriber.
pub fn init(target: LogTarget) -> Result<(), BridgeError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match target {
        LogTarget::Stderr => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| BridgeError::LoggingInit {
                    reason: format!("{}: {e}", path.display()),
                })?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init()
        }
    };
    installed.map_err(|e| BridgeError::LoggingInit {
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritable_file_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("bridge.log");
        let err = init(LogTarget::File(path)).unwrap_err();
        assert_eq!(err.as_label(), "logging_init");
    }
}
