//! Per-session store for the submission order of the current cycle
//!
//! Backed by a `tokio::sync::watch` channel: every publish overwrites the
//! previous value (no accumulation). An older cycle can never overwrite a
//! newer one.

use serde::Serialize;
use tokio::sync::watch;

/// Candidate names of one cycle, as submitted (pre-dedup, may repeat)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubmittedOrder {
    pub cycle: u64,
    pub names: Vec<String>,
}

#[derive(Debug)]
pub struct SubmissionOrderStore {
    sender: watch::Sender<SubmittedOrder>,
}

impl Default for SubmissionOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionOrderStore {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(SubmittedOrder::default());
        Self { sender }
    }

    /// Replace the stored order. Returns false, leaving the store untouched,
    /// when a later cycle has already published.
    pub fn publish(&self, cycle: u64, names: Vec<String>) -> bool {
        let mut pending = Some(names);
        self.sender.send_if_modified(|current| {
            if cycle < current.cycle {
                return false;
            }
            *current = SubmittedOrder {
                cycle,
                names: pending.take().unwrap_or_default(),
            };
            true
        })
    }

    /// Order of the most recent cycle
    pub fn current(&self) -> SubmittedOrder {
        self.sender.borrow().clone()
    }
}
