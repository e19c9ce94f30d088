//! Download budget shared across a harvest traversal.
//!
//! A [`QuotaTracker`] is owned by the run coordinator and handed to every
//! traversal level behind an `Arc`. The budget only shrinks when a document
//! has actually been written to storage; failed downloads give their slot
//! back. Reservations also count downloads that are still in flight, so the
//! number of successful downloads can never exceed the limit, even with
//! several workers racing for the last slots.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, trace};

/// Whether the document limit spans the whole run or restarts every year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaScope {
    /// One running total across all selected years.
    #[default]
    Run,
    /// A fresh budget for every year.
    Year,
}

impl QuotaScope {
    /// Returns the stable label used in config files and CLI flags.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Year => "year",
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    downloaded: u64,
    in_flight: u64,
}

enum Admission {
    Granted,
    Exhausted,
    Wait,
}

/// Shared download budget. A limit of 0 means unlimited.
#[derive(Debug)]
pub struct QuotaTracker {
    limit: u64,
    counters: Mutex<Counters>,
    slot_freed: Notify,
}

impl QuotaTracker {
    /// Creates a tracker with the given limit (0 = unlimited).
    #[must_use]
    pub fn new(limit: u64) -> Arc<Self> {
        Arc::new(Self {
            limit,
            counters: Mutex::new(Counters::default()),
            slot_freed: Notify::new(),
        })
    }

    /// Creates an unlimited tracker.
    #[must_use]
    pub fn unlimited() -> Arc<Self> {
        Self::new(0)
    }

    /// Returns the configured limit (0 = unlimited).
    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Returns true when the tracker never runs out.
    #[must_use]
    pub fn is_unlimited(&self) -> bool {
        self.limit == 0
    }

    /// Number of documents committed as downloaded.
    #[must_use]
    pub fn downloaded(&self) -> u64 {
        self.lock().downloaded
    }

    /// Remaining budget, or `None` when unlimited.
    #[must_use]
    pub fn remaining(&self) -> Option<u64> {
        (!self.is_unlimited()).then(|| self.limit.saturating_sub(self.downloaded()))
    }

    /// Returns true while the walker may keep issuing fetches.
    ///
    /// This does not reserve anything; it only reports whether budget is left
    /// after counting committed downloads.
    #[must_use]
    pub fn has_remaining(&self) -> bool {
        self.is_unlimited() || self.downloaded() < self.limit
    }

    /// Reserves a slot for one download attempt.
    ///
    /// Returns `None` once the budget is spent. When the only remaining slots
    /// belong to downloads still in flight, waits for one of them to either
    /// commit (which may exhaust the budget) or release its slot.
    pub async fn reserve(self: &Arc<Self>) -> Option<QuotaPermit> {
        loop {
            let notified = self.slot_freed.notified();
            match self.admit() {
                Admission::Granted => {
                    return Some(QuotaPermit {
                        tracker: Arc::clone(self),
                        settled: false,
                    });
                }
                Admission::Exhausted => {
                    debug!(limit = self.limit, "quota exhausted");
                    return None;
                }
                Admission::Wait => {
                    trace!("all remaining quota slots in flight; waiting");
                    notified.await;
                }
            }
        }
    }

    fn admit(&self) -> Admission {
        let mut counters = self.lock();
        if self.is_unlimited() {
            counters.in_flight += 1;
            return Admission::Granted;
        }
        if counters.downloaded >= self.limit {
            return Admission::Exhausted;
        }
        if counters.downloaded + counters.in_flight < self.limit {
            counters.in_flight += 1;
            Admission::Granted
        } else {
            Admission::Wait
        }
    }

    fn settle(&self, committed: bool) {
        {
            let mut counters = self.lock();
            counters.in_flight = counters.in_flight.saturating_sub(1);
            if committed {
                counters.downloaded += 1;
            }
        }
        self.slot_freed.notify_waiters();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An in-flight reservation. Dropping it without [`commit`](Self::commit)
/// returns the slot to the budget.
#[derive(Debug)]
pub struct QuotaPermit {
    tracker: Arc<QuotaTracker>,
    settled: bool,
}

impl QuotaPermit {
    /// Consumes one unit of budget for a confirmed download.
    pub fn commit(mut self) {
        self.settled = true;
        self.tracker.settle(true);
    }
}

impl Drop for QuotaPermit {
    fn drop(&mut self) {
        if !self.settled {
            self.tracker.settle(false);
        }
    }
}
