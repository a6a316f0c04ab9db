//! Session counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct SessionMetrics {
    sessions_started: Arc<AtomicU64>,
    sessions_finalized: Arc<AtomicU64>,
    sessions_failed: Arc<AtomicU64>,
    discarded_events: Arc<AtomicU64>,
    gems_revealed: Arc<AtomicU64>,
    mines_revealed: Arc<AtomicU64>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub sessions_started: u64,
    pub sessions_finalized: u64,
    pub sessions_failed: u64,
    pub discarded_events: u64,
    pub gems_revealed: u64,
    pub mines_revealed: u64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_finalized(&self, gems: u64, mines: u64) {
        self.sessions_finalized.fetch_add(1, Ordering::SeqCst);
        self.gems_revealed.fetch_add(gems, Ordering::SeqCst);
        self.mines_revealed.fetch_add(mines, Ordering::SeqCst);
    }

    pub fn record_failed(&self) {
        self.sessions_failed.fetch_add(1, Ordering::SeqCst);
    }

    /// Outcome event that matched no live session
    pub fn record_discarded(&self) {
        self.discarded_events.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_started: self.sessions_started.load(Ordering::SeqCst),
            sessions_finalized: self.sessions_finalized.load(Ordering::SeqCst),
            sessions_failed: self.sessions_failed.load(Ordering::SeqCst),
            discarded_events: self.discarded_events.load(Ordering::SeqCst),
            gems_revealed: self.gems_revealed.load(Ordering::SeqCst),
            mines_revealed: self.mines_revealed.load(Ordering::SeqCst),
        }
    }
}
