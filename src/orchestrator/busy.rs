//! Busy flags and call sequencing.

use crate::state::DocsProvenance;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// In-flight counter for one operation kind. Set while any call of that kind runs.
#[derive(Debug, Default)]
pub(crate) struct BusyFlag {
    in_flight: AtomicUsize,
}

impl BusyFlag {
    /// Mark a call as running until the returned guard is dropped.
    pub(crate) fn acquire(&self) -> BusyGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        BusyGuard { flag: self }
    }

    pub(crate) fn is_set(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Number of calls currently holding a guard, including the caller's own.
    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Releases its flag on every exit path, including early returns and panics.
pub(crate) struct BusyGuard<'a> {
    flag: &'a BusyFlag,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Ticket handed to a call when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket {
    pub seq: u64,
}

/// Per-kind start and completion counters.
///
/// Start tickets record the order calls were issued in; completion stamps record the
/// order results were applied in. Both only ever grow.
#[derive(Debug, Default)]
pub(crate) struct Sequencer {
    started: AtomicU64,
    completed: AtomicU64,
}

impl Sequencer {
    pub(crate) fn begin(&self) -> Ticket {
        Ticket {
            seq: self.started.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }

    /// Stamp a result as applied. Call while holding the state write lock so the
    /// stamp order matches the apply order.
    pub(crate) fn complete(&self, ticket: Ticket) -> DocsProvenance {
        DocsProvenance {
            request_seq: ticket.seq,
            completion_seq: self.completed.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }
}
