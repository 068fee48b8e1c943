// src/ct_source/mod.rs
use async_trait::async_trait;

use crate::types::{Cursor, Issuance};

pub mod client;

pub use client::CertSpotterClient;

/// Classified result of one issuance query
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Nothing was issued after the cursor
    Empty,
    /// Certificates issued after the cursor, in ascending issuance order
    Batch(Vec<Issuance>),
    /// Upstream throttling, or a degraded payload that cannot be trusted
    RateLimited,
    /// Connection-level failure or an unexpected status
    Unreachable(String),
}

impl FetchOutcome {
    /// Short label used in log lines
    pub fn label(&self) -> &'static str {
        match self {
            FetchOutcome::Empty => "empty",
            FetchOutcome::Batch(_) => "batch",
            FetchOutcome::RateLimited => "rate_limited",
            FetchOutcome::Unreachable(_) => "unreachable",
        }
    }
}

/// Source of "certificates for domain X issued after cursor C".
///
/// Implementations never retry; the caller waits for the next poll cycle.
#[async_trait]
pub trait IssuanceSource: Send + Sync {
    async fn fetch(&self, domain: &str, cursor: &Cursor) -> FetchOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(FetchOutcome::Empty.label(), "empty");
        assert_eq!(FetchOutcome::Batch(vec![]).label(), "batch");
        assert_eq!(FetchOutcome::RateLimited.label(), "rate_limited");
        assert_eq!(
            FetchOutcome::Unreachable("timeout".to_string()).label(),
            "unreachable"
        );
    }
}
