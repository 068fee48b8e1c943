// src/scheduler.rs
use anyhow::Result;
use rand::seq::SliceRandom;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::stats::StatsCollector;
use crate::tracker::{DomainOutcome, DomainTracker};

/// Tally of one pass over the watch list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub processed: usize,
    pub bootstrapped: usize,
    pub advanced: usize,
    pub skipped: usize,
    pub notified: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: &DomainOutcome) {
        self.processed += 1;
        match outcome {
            DomainOutcome::Bootstrapped { .. } => self.bootstrapped += 1,
            DomainOutcome::Advanced { notified, .. } => {
                self.advanced += 1;
                self.notified += notified;
            }
            DomainOutcome::Skipped(_) => self.skipped += 1,
            DomainOutcome::BootstrapPending { .. } | DomainOutcome::UpToDate => {}
        }
    }
}

/// Drives the tracker over every watched domain, once per interval
pub struct Scheduler {
    domains: Vec<String>,
    tracker: DomainTracker,
    interval: Duration,
    stats: StatsCollector,
}

impl Scheduler {
    pub fn new(
        domains: Vec<String>,
        tracker: DomainTracker,
        interval: Duration,
        stats: StatsCollector,
    ) -> Self {
        Self {
            domains,
            tracker,
            interval,
            stats,
        }
    }

    /// Process every domain once, in a fresh random order.
    ///
    /// Domains are handled sequentially. A fatal tracker error aborts the
    /// cycle immediately.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let mut order = self.domains.clone();
        {
            let mut rng = rand::thread_rng();
            order.shuffle(&mut rng);
        }
        debug!("Cycle order: {:?}", order);

        let mut report = CycleReport::default();
        for domain in &order {
            let outcome = self.tracker.process(domain).await?;
            report.record(&outcome);
        }

        self.stats.increment_cycles();
        info!(
            "Cycle complete: {} domains ({} bootstrapped, {} advanced, {} skipped, {} alerts)",
            report.processed, report.bootstrapped, report.advanced, report.skipped, report.notified
        );
        Ok(report)
    }

    /// Run cycles until shutdown is signalled.
    ///
    /// The signal is only observed while sleeping, so a started cycle always
    /// runs to completion.
    pub async fn run(&mut self, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        info!(
            "Watching {} domains, polling every {}s",
            self.domains.len(),
            self.interval.as_secs()
        );

        loop {
            self.run_cycle().await?;
            info!("Stats: {}", self.stats.format_stats());
            self.tracker.health().log_summary();

            if *shutdown_rx.borrow() {
                break;
            }

            // Sleep until next cycle or shutdown
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Shutdown requested, scheduler stopped");
        Ok(())
    }
}
