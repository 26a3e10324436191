//! Ingest counters, shared between the pipeline and the stats printer.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct IngestStats {
    pub lines: AtomicU64,
    pub events: AtomicU64,
    pub malformed: AtomicU64,
    pub unknown_cid: AtomicU64,
    pub rejected_path: AtomicU64,
    pub resolve_failed: AtomicU64,
    pub peer_not_found: AtomicU64,
    pub records_written: AtomicU64,
    pub write_failed: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub lines: u64,
    pub events: u64,
    pub malformed: u64,
    pub unknown_cid: u64,
    pub rejected_path: u64,
    pub resolve_failed: u64,
    pub peer_not_found: u64,
    pub records_written: u64,
    pub write_failed: u64,
}

impl IngestStats {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            lines: get(&self.lines),
            events: get(&self.events),
            malformed: get(&self.malformed),
            unknown_cid: get(&self.unknown_cid),
            rejected_path: get(&self.rejected_path),
            resolve_failed: get(&self.resolve_failed),
            peer_not_found: get(&self.peer_not_found),
            records_written: get(&self.records_written),
            write_failed: get(&self.write_failed),
        }
    }

    /// Log current counters. Quiet until the first line arrives.
    pub fn print_stats(&self) {
        let s = self.snapshot();
        if s.lines == 0 {
            return;
        }
        tracing::info!(
            lines = s.lines,
            events = s.events,
            malformed = s.malformed,
            unknown_cid = s.unknown_cid,
            rejected_path = s.rejected_path,
            resolve_failed = s.resolve_failed,
            peer_not_found = s.peer_not_found,
            records_written = s.records_written,
            write_failed = s.write_failed,
            "ingest stats"
        );
    }
}
