//! Exclusion list for certificates that must never alert

use std::collections::HashSet;

use crate::types::{normalize_domain, Issuance};

/// Filter that suppresses notifications for certificates naming an excluded DNS name
#[derive(Clone, Debug, Default)]
pub struct ExclusionFilter {
    excluded: HashSet<String>,
}

impl ExclusionFilter {
    /// Create a filter from a list of DNS names. Unusable entries are ignored
    pub fn from_list(names: &[String]) -> Self {
        let excluded = names
            .iter()
            .filter_map(|name| normalize_domain(name))
            .collect();

        Self { excluded }
    }

    /// Check whether any DNS name on the certificate is excluded.
    ///
    /// Comparison is exact after normalization: excluding
    /// `test.example.com` does not exclude `a.test.example.com`.
    pub fn is_excluded(&self, issuance: &Issuance) -> bool {
        if self.excluded.is_empty() {
            return false;
        }

        issuance
            .dns_names
            .iter()
            .filter_map(|name| normalize_domain(name))
            .any(|name| self.excluded.contains(&name))
    }

    /// Get the number of excluded names
    pub fn count(&self) -> usize {
        self.excluded.len()
    }
}
