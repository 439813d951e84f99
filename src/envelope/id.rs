//! Correlation ids and monotonic timestamps.

use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Global correlation counter; ids start at 1.
static NEXT_CORRELATION: AtomicU64 = AtomicU64::new(1);

/// Process-wide monotonic epoch for [`Timestamp`].
static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Opaque token linking a `Result`/`Error` to its originating `Command`.
///
/// Issued by the host side only, unique and monotonically increasing per process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CORRELATION.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Returns the raw value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic clock value: microseconds since the process-wide epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Reads the monotonic clock.
    pub fn now() -> Self {
        let epoch = *EPOCH.get_or_init(Instant::now);
        let us = epoch.elapsed().as_micros().min(u128::from(u64::MAX)) as u64;
        Self(us)
    }

    /// Returns the raw microsecond value.
    pub fn as_micros(self) -> u64 {
        self.0
    }

    /// Returns the time elapsed between `earlier` and `self` (zero if `earlier` is later).
    pub fn since(self, earlier: Timestamp) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
