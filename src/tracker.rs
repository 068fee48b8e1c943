// src/tracker.rs
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::ct_source::{FetchOutcome, IssuanceSource};
use crate::filter::ExclusionFilter;
use crate::health::DomainHealthTracker;
use crate::notifier::Notifier;
use crate::state::CursorStore;
use crate::stats::StatsCollector;
use crate::types::{Alert, Cursor, Issuance};

/// Why a domain was left untouched for this cycle
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    RateLimited,
    Unreachable(String),
    StoreUnavailable(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::RateLimited => write!(f, "rate limited"),
            SkipReason::Unreachable(msg) => write!(f, "unreachable: {}", msg),
            SkipReason::StoreUnavailable(msg) => write!(f, "cursor store unavailable: {}", msg),
        }
    }
}

/// Result of processing one domain for one cycle
#[derive(Debug, Clone, PartialEq)]
pub enum DomainOutcome {
    /// Baseline cursor established and persisted; nothing was alerted
    Bootstrapped { baseline: Cursor },
    /// Still paging through history; resumes next cycle from `position`
    BootstrapPending { position: Cursor },
    /// Tracked, and nothing new since the cursor
    UpToDate,
    /// New certificates processed and the cursor moved `from` → `to`
    Advanced {
        from: Cursor,
        to: Cursor,
        notified: usize,
        excluded: usize,
        failed: usize,
    },
    Skipped(SkipReason),
}

/// Tuning for the tracker
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Discovery pages fetched per cycle while bootstrapping a domain
    pub bootstrap_page_limit: u32,
    pub failure_threshold: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            bootstrap_page_limit: 10,
            failure_threshold: 3,
        }
    }
}

/// Per-domain cursor state machine.
///
/// Untracked domains are bootstrapped without alerting; tracked domains get
/// one incremental fetch per cycle. The cursor is only written after a
/// `Batch`, and then exactly once, to the batch's last identifier.
pub struct DomainTracker {
    source: Arc<dyn IssuanceSource>,
    store: Arc<dyn CursorStore>,
    notifier: Arc<dyn Notifier>,
    exclusions: ExclusionFilter,
    config: TrackerConfig,
    stats: StatsCollector,
    health: DomainHealthTracker,
    /// Discovery position of domains whose bootstrap spans several cycles
    bootstrap_positions: HashMap<String, Cursor>,
}

impl DomainTracker {
    pub fn new(
        source: Arc<dyn IssuanceSource>,
        store: Arc<dyn CursorStore>,
        notifier: Arc<dyn Notifier>,
        exclusions: ExclusionFilter,
        config: TrackerConfig,
        stats: StatsCollector,
    ) -> Self {
        let health = DomainHealthTracker::new(config.failure_threshold);
        Self {
            source,
            store,
            notifier,
            exclusions,
            config,
            stats,
            health,
            bootstrap_positions: HashMap::new(),
        }
    }

    pub fn health(&self) -> &DomainHealthTracker {
        &self.health
    }

    /// Process one domain for the current cycle.
    ///
    /// Only a failed cursor write is returned as an error: once alerts have
    /// gone out the new position must be durable, so the caller must stop.
    pub async fn process(&mut self, domain: &str) -> Result<DomainOutcome> {
        let tracked = match self.store.exists(domain).await {
            Ok(tracked) => tracked,
            Err(e) => return Ok(self.skip(domain, SkipReason::StoreUnavailable(format!("{:#}", e)))),
        };

        let outcome = if tracked {
            self.poll_tracked(domain).await?
        } else {
            self.bootstrap(domain).await?
        };

        match outcome {
            DomainOutcome::Skipped(_) => {}
            _ => self.health.record_success(domain),
        }
        Ok(outcome)
    }

    fn skip(&mut self, domain: &str, reason: SkipReason) -> DomainOutcome {
        match reason {
            SkipReason::RateLimited => {
                info!("{}: Rate limited, retrying next cycle", domain)
            }
            ref other => error!("{}: Skipping this cycle ({})", domain, other),
        }
        self.stats.increment_domains_skipped();
        self.health.record_failure(domain, reason.to_string());
        DomainOutcome::Skipped(reason)
    }

    /// Establish the baseline cursor for a domain seen for the first time.
    ///
    /// Pages forward from the empty cursor; the first empty page means the
    /// current position is the newest known certificate. Nothing fetched here
    /// is alerted.
    async fn bootstrap(&mut self, domain: &str) -> Result<DomainOutcome> {
        let mut position = self
            .bootstrap_positions
            .get(domain)
            .cloned()
            .unwrap_or_else(Cursor::empty);

        info!("{}: Not tracked yet, bootstrapping from cursor {}", domain, position);

        for page in 0..self.config.bootstrap_page_limit {
            self.stats.increment_fetches();
            let outcome = self.source.fetch(domain, &position).await;
            debug!(
                "{}: Bootstrap fetch after cursor {} classified {}",
                domain,
                position,
                outcome.label()
            );
            match outcome {
                FetchOutcome::Batch(issuances) => {
                    if let Some(last) = issuances.last() {
                        position = Cursor::new(last.id.clone());
                    }
                    debug!(
                        "{}: Bootstrap page {} had {} existing certificates, position now {}",
                        domain,
                        page + 1,
                        issuances.len(),
                        position
                    );
                }
                FetchOutcome::Empty => {
                    self.store
                        .write(domain, &position)
                        .await
                        .with_context(|| format!("Failed to persist baseline cursor for {}", domain))?;
                    self.bootstrap_positions.remove(domain);
                    info!("{}: Now tracked with baseline cursor {}", domain, position);
                    return Ok(DomainOutcome::Bootstrapped { baseline: position });
                }
                FetchOutcome::RateLimited => {
                    self.bootstrap_positions.insert(domain.to_string(), position);
                    return Ok(self.skip(domain, SkipReason::RateLimited));
                }
                FetchOutcome::Unreachable(msg) => {
                    self.bootstrap_positions.insert(domain.to_string(), position);
                    return Ok(self.skip(domain, SkipReason::Unreachable(msg)));
                }
            }
        }

        info!(
            "{}: Bootstrap still paging after {} pages, resuming next cycle from {}",
            domain, self.config.bootstrap_page_limit, position
        );
        self.bootstrap_positions
            .insert(domain.to_string(), position.clone());
        Ok(DomainOutcome::BootstrapPending { position })
    }

    /// One incremental fetch after the stored cursor
    async fn poll_tracked(&mut self, domain: &str) -> Result<DomainOutcome> {
        let cursor = match self.store.read(domain).await {
            Ok(cursor) => cursor,
            Err(e) => return Ok(self.skip(domain, SkipReason::StoreUnavailable(format!("{:#}", e)))),
        };

        self.stats.increment_fetches();
        let outcome = self.source.fetch(domain, &cursor).await;
        debug!(
            "{}: Fetch after cursor {} classified {}",
            domain,
            cursor,
            outcome.label()
        );
        match outcome {
            FetchOutcome::Empty => {
                debug!("{}: Up to date at cursor {}", domain, cursor);
                Ok(DomainOutcome::UpToDate)
            }
            FetchOutcome::RateLimited => Ok(self.skip(domain, SkipReason::RateLimited)),
            FetchOutcome::Unreachable(msg) => Ok(self.skip(domain, SkipReason::Unreachable(msg))),
            FetchOutcome::Batch(issuances) => self.process_batch(domain, cursor, issuances).await,
        }
    }

    async fn process_batch(
        &mut self,
        domain: &str,
        from: Cursor,
        issuances: Vec<Issuance>,
    ) -> Result<DomainOutcome> {
        let Some(last) = issuances.last() else {
            return Ok(DomainOutcome::UpToDate);
        };
        let to = Cursor::new(last.id.clone());

        info!(
            "{}: {} new certificates after cursor {}",
            domain,
            issuances.len(),
            from
        );
        self.stats.add_certificates_seen(issuances.len() as u64);

        let mut notified = 0;
        let mut excluded = 0;
        let mut failed = 0;

        for issuance in issuances {
            if self.exclusions.is_excluded(&issuance) {
                debug!(
                    "{}: Certificate {} names an excluded host, not alerting",
                    domain, issuance.id
                );
                excluded += 1;
                self.stats.increment_excluded();
                continue;
            }

            let alert = Alert::new(domain, issuance);
            match self.notifier.notify(&alert).await {
                Ok(()) => {
                    notified += 1;
                    self.stats.increment_notifications_sent();
                }
                Err(e) => {
                    failed += 1;
                    self.stats.increment_notifications_failed();
                    warn!(
                        "{}: Failed to deliver alert for certificate {}: {:#}",
                        domain, alert.issuance.id, e
                    );
                }
            }
        }

        self.store
            .write(domain, &to)
            .await
            .with_context(|| format!("Failed to advance cursor for {} to {}", domain, to))?;

        info!(
            "{}: Cursor advanced {} -> {} ({} alerted, {} excluded, {} failed deliveries)",
            domain, from, to, notified, excluded, failed
        );

        Ok(DomainOutcome::Advanced {
            from,
            to,
            notified,
            excluded,
            failed,
        })
    }
}
