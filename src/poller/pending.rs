//! Outstanding-command table.
//!
//! Every command sent through the bridge is recorded here until exactly one of:
//! its response is dispatched, it expires, its worker exits, or its worker is disposed.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::envelope::{CorrelationId, Envelope};
use crate::worker::WorkerId;

/// Host callback invoked with the response (or synthetic error) of one command.
pub type Continuation = Box<dyn FnOnce(Envelope)>;

pub(crate) struct Outstanding {
    pub worker: WorkerId,
    pub timeout: Option<Duration>,
    pub issued: Instant,
    pub continuation: Option<Continuation>,
}

impl Outstanding {
    fn is_overdue(&self, now: Instant) -> bool {
        self.timeout
            .is_some_and(|t| now.saturating_duration_since(self.issued) >= t)
    }
}

#[derive(Default)]
pub(crate) struct Pending {
    entries: HashMap<CorrelationId, Outstanding>,
}

impl Pending {
    pub(crate) fn insert(&mut self, id: CorrelationId, entry: Outstanding) {
        self.entries.insert(id, entry);
    }

    /// Removes `id` if it is outstanding for `worker`.
    ///
    /// A response carrying an id issued to a different worker is not a match.
    pub(crate) fn take(&mut self, worker: WorkerId, id: CorrelationId) -> Option<Outstanding> {
        match self.entries.get(&id) {
            Some(entry) if entry.worker == worker => self.entries.remove(&id),
            _ => None,
        }
    }

    /// Removes every command of `worker` whose timeout has elapsed, oldest first.
    pub(crate) fn take_overdue(
        &mut self,
        worker: WorkerId,
        now: Instant,
    ) -> Vec<(CorrelationId, Outstanding)> {
        self.take_where(|e| e.worker == worker && e.is_overdue(now))
    }

    /// Removes every command of `worker`, oldest first.
    pub(crate) fn take_worker(&mut self, worker: WorkerId) -> Vec<(CorrelationId, Outstanding)> {
        self.take_where(|e| e.worker == worker)
    }

    pub(crate) fn contains(&self, id: CorrelationId) -> bool {
        self.entries.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn take_where(
        &mut self,
        pred: impl Fn(&Outstanding) -> bool,
    ) -> Vec<(CorrelationId, Outstanding)> {
        let mut ids: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, e)| pred(e))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|e| (id, e)))
            .collect()
    }
}
