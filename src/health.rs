// src/health.rs
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Health status of a watched domain's upstream queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainHealth {
    /// Last poll succeeded
    Healthy,
    /// Some consecutive failures, below the threshold
    Degraded,
    /// At least `failure_threshold` consecutive failures
    Failed,
}

/// Health information for a single domain
#[derive(Debug, Clone)]
pub struct DomainHealthInfo {
    pub status: DomainHealth,
    /// Number of consecutive failed cycles
    pub failure_count: u32,
    pub last_failure: Option<Instant>,
    pub last_success: Option<Instant>,
    pub last_error: Option<String>,
}

impl DomainHealthInfo {
    fn new() -> Self {
        Self {
            status: DomainHealth::Healthy,
            failure_count: 0,
            last_failure: None,
            last_success: None,
            last_error: None,
        }
    }
}

/// Tracks per-domain failure streaks across poll cycles.
///
/// Observational only: a failing domain is still polled every cycle.
pub struct DomainHealthTracker {
    health: HashMap<String, DomainHealthInfo>,
    failure_threshold: u32,
}

impl DomainHealthTracker {
    /// # Arguments
    /// * `failure_threshold` - Consecutive failures before a domain is marked Failed
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            health: HashMap::new(),
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// Record a cycle in which the domain was processed without a failure
    pub fn record_success(&mut self, domain: &str) {
        let info = self
            .health
            .entry(domain.to_string())
            .or_insert_with(DomainHealthInfo::new);

        let previous = info.status;
        info.status = DomainHealth::Healthy;
        info.failure_count = 0;
        info.last_success = Some(Instant::now());

        match previous {
            DomainHealth::Failed => info!("Domain recovered: {} is now healthy (was failed)", domain),
            DomainHealth::Degraded => debug!("Domain recovered: {} is now healthy (was degraded)", domain),
            DomainHealth::Healthy => {}
        }
    }

    /// Record a cycle in which the domain had to be skipped
    pub fn record_failure(&mut self, domain: &str, error: String) {
        let threshold = self.failure_threshold;
        let info = self
            .health
            .entry(domain.to_string())
            .or_insert_with(DomainHealthInfo::new);

        info.failure_count += 1;
        info.last_failure = Some(Instant::now());
        info.last_error = Some(error.clone());

        let old_status = info.status;
        info.status = if info.failure_count >= threshold {
            DomainHealth::Failed
        } else {
            DomainHealth::Degraded
        };

        match (old_status, info.status) {
            (DomainHealth::Healthy, DomainHealth::Degraded) => {
                warn!(
                    "Domain degraded: {} (failure {}/{}): {}",
                    domain, info.failure_count, threshold, error
                );
            }
            (DomainHealth::Degraded, DomainHealth::Failed)
            | (DomainHealth::Healthy, DomainHealth::Failed) => {
                warn!(
                    "Domain failing: {} ({} consecutive cycles): {}",
                    domain, info.failure_count, error
                );
            }
            (DomainHealth::Failed, DomainHealth::Failed) => {
                debug!(
                    "Domain still failing: {} (failure {}): {}",
                    domain, info.failure_count, error
                );
            }
            _ => {}
        }
    }

    /// Current status; unknown domains are Healthy
    pub fn get_status(&self, domain: &str) -> DomainHealth {
        self.health
            .get(domain)
            .map(|info| info.status)
            .unwrap_or(DomainHealth::Healthy)
    }

    pub fn get_info(&self, domain: &str) -> Option<&DomainHealthInfo> {
        self.health.get(domain)
    }

    /// Count of (healthy, degraded, failed) domains
    pub fn get_stats(&self) -> (usize, usize, usize) {
        let mut healthy = 0;
        let mut degraded = 0;
        let mut failed = 0;

        for info in self.health.values() {
            match info.status {
                DomainHealth::Healthy => healthy += 1,
                DomainHealth::Degraded => degraded += 1,
                DomainHealth::Failed => failed += 1,
            }
        }

        (healthy, degraded, failed)
    }

    /// Log a summary when any domain is unhealthy
    pub fn log_summary(&self) {
        let (healthy, degraded, failed) = self.get_stats();
        if degraded == 0 && failed == 0 {
            return;
        }

        info!(
            "Domain health summary: {} total ({} healthy, {} degraded, {} failed)",
            healthy + degraded + failed,
            healthy,
            degraded,
            failed
        );

        for (domain, info) in self.health.iter() {
            if info.status == DomainHealth::Failed {
                if let Some(ref error) = info.last_error {
                    warn!(
                        "Failing domain: {} - {} consecutive failures, last error: {}",
                        domain, info.failure_count, error
                    );
                }
            }
        }
    }
}

impl Default for DomainHealthTracker {
    fn default() -> Self {
        Self::new(3)
    }
}
