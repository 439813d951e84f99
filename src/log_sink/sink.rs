//! # Durable diagnostic sink.
//!
//! [`LogSink`] appends [`LogRecord`]s to a text file, one line per record, writing
//! and flushing on every call so a crash loses at most the in-flight record.
//!
//! ## Rules
//! - **Any thread**: `emit` may be called concurrently from workers and the host
//! - **Scoped access**: every operation holds the file lock only for its own duration;
//!   the guard is released on every exit path, including unwinding
//! - **Poison recovery**: a thread that panicked while holding the lock does not
//!   disable the sink; the file handle is always either valid or released
//! - **After close**: `emit` is a no-op reported via `tracing`

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::BridgeError;
use crate::log_sink::LogRecord;

/// Append-only, flush-on-write log file.
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl LogSink {
    /// Opens (or creates) the file at `path` in append mode.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BridgeError> {
        let path = path.into();
        let file = open_append(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    /// Returns the path of the active file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path a rotated file is moved to (`<path>.1`).
    pub fn rotated_path(&self) -> PathBuf {
        let mut s = self.path.as_os_str().to_owned();
        s.push(".1");
        PathBuf::from(s)
    }

    /// Returns `false` once [`close`](Self::close) has been called.
    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Appends one record and flushes it.
    pub fn emit(&self, record: &LogRecord) -> Result<(), BridgeError> {
        let line = record.to_line();
        let mut guard = self.lock();
        match guard.as_mut() {
            Some(file) => {
                file.write_all(line.as_bytes())?;
                file.flush()?;
                Ok(())
            }
            None => {
                tracing::debug!(path = %self.path.display(), "emit on closed log sink ignored");
                Ok(())
            }
        }
    }

    /// Moves the current file to [`rotated_path`](Self::rotated_path) and starts a fresh one.
    ///
    /// The old handle is released before the rename. If reopening fails the sink
    /// stays closed and the error is returned.
    pub fn rotate(&self) -> Result<(), BridgeError> {
        let mut guard = self.lock();
        if let Some(mut old) = guard.take() {
            old.flush()?;
        }
        let renamed = fs::rename(&self.path, self.rotated_path());
        *guard = Some(open_append(&self.path)?);
        renamed.map_err(BridgeError::from)
    }

    /// Flushes and releases the file; later emits are ignored.
    pub fn close(&self) -> Result<(), BridgeError> {
        let mut guard = self.lock();
        if let Some(mut file) = guard.take() {
            file.flush()?;
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Option<File>> {
        self.file.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn open_append(path: &Path) -> Result<File, BridgeError> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::log_sink::Level;
    use crate::worker::WorkerId;

    fn lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn emit_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::open(dir.path().join("bridge.log")).unwrap();

        sink.emit(&LogRecord::new(Some(WorkerId::new(1)), Level::Info, "first"))
            .unwrap();
        sink.emit(&LogRecord::host(Level::Error, "second")).unwrap();

        let got = lines(sink.path());
        assert_eq!(got.len(), 2);
        assert!(got[0].ends_with("worker=1 level=INFO first"));
        assert!(got[1].ends_with("worker=host level=ERROR second"));
    }

    #[test]
    fn reopening_appends_instead_of_truncating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.log");
        LogSink::open(&path)
            .unwrap()
            .emit(&LogRecord::host(Level::Info, "session one"))
            .unwrap();
        LogSink::open(&path)
            .unwrap()
            .emit(&LogRecord::host(Level::Info, "session two"))
            .unwrap();
        assert_eq!(lines(&path).len(), 2);
    }

    #[test]
    fn concurrent_emitters_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(LogSink::open(dir.path().join("bridge.log")).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|w| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for i in 0..50 {
                        let rec =
                            LogRecord::new(Some(WorkerId::new(w)), Level::Debug, format!("msg {i}"));
                        sink.emit(&rec).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let got = lines(sink.path());
        assert_eq!(got.len(), 200);
        assert!(got.iter().all(|l| l.contains(" level=DEBUG msg ")));
    }

    #[test]
    fn rotate_moves_history_aside() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::open(dir.path().join("bridge.log")).unwrap();
        sink.emit(&LogRecord::host(Level::Info, "old")).unwrap();

        sink.rotate().unwrap();
        sink.emit(&LogRecord::host(Level::Info, "new")).unwrap();

        assert_eq!(lines(&sink.rotated_path()).len(), 1);
        let current = lines(sink.path());
        assert_eq!(current.len(), 1);
        assert!(current[0].ends_with("new"));
    }

    #[test]
    fn emit_after_close_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::open(dir.path().join("bridge.log")).unwrap();
        sink.close().unwrap();

        assert!(!sink.is_open());
        sink.emit(&LogRecord::host(Level::Info, "late")).unwrap();
        assert!(lines(sink.path()).is_empty());
    }

    #[test]
    fn panic_in_another_thread_does_not_disable_sink() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(LogSink::open(dir.path().join("bridge.log")).unwrap());

        let s = Arc::clone(&sink);
        let res = thread::spawn(move || {
            let _guard = s.lock();
            panic!("worker died holding the sink");
        })
        .join();
        assert!(res.is_err());

        sink.emit(&LogRecord::host(Level::Info, "still alive")).unwrap();
        assert_eq!(lines(sink.path()).len(), 1);
    }
}
