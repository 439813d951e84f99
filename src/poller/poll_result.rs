use crate::envelope::{Envelope, Kind};
use crate::worker::WorkerId;

/// What one [`Bridge::poll`](crate::Bridge::poll) produced for one worker.
///
/// Holds every drained envelope that no continuation or listener consumed, in the
/// order the worker enqueued them (synthetic timeout errors come last), plus
/// per-poll statistics.
#[derive(Debug)]
pub struct PollResult {
    worker: WorkerId,
    envelopes: Vec<Envelope>,
    dropped_total: u64,
    unmatched: usize,
    expired: usize,
}

impl PollResult {
    pub(crate) fn new(worker: WorkerId, dropped_total: u64) -> Self {
        Self {
            worker,
            envelopes: Vec::new(),
            dropped_total,
            unmatched: 0,
            expired: 0,
        }
    }

    pub(crate) fn push(&mut self, env: Envelope) {
        self.envelopes.push(env);
    }

    pub(crate) fn note_unmatched(&mut self) {
        self.unmatched += 1;
    }

    pub(crate) fn note_expired(&mut self) {
        self.expired += 1;
    }

    /// The worker this result belongs to.
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    pub fn envelopes(&self) -> &[Envelope] {
        &self.envelopes
    }

    pub fn into_envelopes(self) -> Vec<Envelope> {
        self.envelopes
    }

    /// Lossy envelopes the worker's channel has discarded since it was created.
    pub fn dropped_total(&self) -> u64 {
        self.dropped_total
    }

    /// Responses discarded during this poll because no outstanding command matched.
    pub fn unmatched(&self) -> usize {
        self.unmatched
    }

    /// Commands that timed out during this poll.
    pub fn expired(&self) -> usize {
        self.expired
    }

    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Envelope> {
        self.envelopes.iter()
    }

    /// Envelopes of the given kind, in order.
    pub fn of_kind(&self, kind: Kind) -> impl Iterator<Item = &Envelope> {
        self.envelopes.iter().filter(move |e| e.kind() == kind)
    }
}

impl IntoIterator for PollResult {
    type Item = Envelope;
    type IntoIter = std::vec::IntoIter<Envelope>;

    fn into_iter(self) -> Self::IntoIter {
        self.envelopes.into_iter()
    }
}

impl<'a> IntoIterator for &'a PollResult {
    type Item = &'a Envelope;
    type IntoIter = std::slice::Iter<'a, Envelope>;

    fn into_iter(self) -> Self::IntoIter {
        self.envelopes.iter()
    }
}
