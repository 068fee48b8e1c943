//! Statistics tracking for ct-tripwire

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Thread-safe statistics collector
#[derive(Clone)]
pub struct StatsCollector {
    cycles: Arc<AtomicU64>,
    fetches: Arc<AtomicU64>,
    certificates_seen: Arc<AtomicU64>,
    notifications_sent: Arc<AtomicU64>,
    notifications_failed: Arc<AtomicU64>,
    excluded: Arc<AtomicU64>,
    domains_skipped: Arc<AtomicU64>,
    start_time: Instant,
}

/// Snapshot of statistics at a point in time
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub cycles: u64,
    pub fetches: u64,
    pub certificates_seen: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub excluded: u64,
    pub domains_skipped: u64,
    pub uptime_secs: u64,
}

impl StatsCollector {
    /// Create a new StatsCollector
    pub fn new() -> Self {
        Self {
            cycles: Arc::new(AtomicU64::new(0)),
            fetches: Arc::new(AtomicU64::new(0)),
            certificates_seen: Arc::new(AtomicU64::new(0)),
            notifications_sent: Arc::new(AtomicU64::new(0)),
            notifications_failed: Arc::new(AtomicU64::new(0)),
            excluded: Arc::new(AtomicU64::new(0)),
            domains_skipped: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn increment_cycles(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_fetches(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    /// Count certificates returned by incremental (non-bootstrap) fetches
    pub fn add_certificates_seen(&self, count: u64) {
        self.certificates_seen.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_notifications_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_notifications_failed(&self) {
        self.notifications_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_excluded(&self) {
        self.excluded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_domains_skipped(&self) {
        self.domains_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            certificates_seen: self.certificates_seen.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
            excluded: self.excluded.load(Ordering::Relaxed),
            domains_skipped: self.domains_skipped.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    /// Format statistics as a human-readable string
    pub fn format_stats(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            "{} cycles | {} fetches | {} new certs | {} alerts ({} failed) | {} excluded | {} skipped | uptime: {}",
            snapshot.cycles,
            snapshot.fetches,
            snapshot.certificates_seen,
            snapshot.notifications_sent,
            snapshot.notifications_failed,
            snapshot.excluded,
            snapshot.domains_skipped,
            Self::format_uptime(snapshot.uptime_secs)
        )
    }

    /// Format uptime duration
    pub fn format_uptime(secs: u64) -> String {
        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}
