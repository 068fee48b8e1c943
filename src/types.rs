// src/types.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque position marker for a watched domain.
///
/// Everything up to and including the certificate with this identifier is
/// considered already known. The value is never interpreted or compared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The cursor of a domain with no known certificates
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<empty>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Certificate authority descriptor as returned with `expand=issuer`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Issuer {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub friendly_name: Option<String>,
}

impl Issuer {
    /// Friendly name when available, distinguished name otherwise
    pub fn display_name(&self) -> &str {
        self.friendly_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("unknown issuer")
    }
}

/// One issued certificate from the CT aggregation API.
///
/// `id` is mandatory: an element without it is a degraded response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issuance {
    pub id: String,

    #[serde(default)]
    pub dns_names: Vec<String>,

    #[serde(default)]
    pub issuer: Option<Issuer>,

    #[serde(default)]
    pub not_before: Option<String>,

    #[serde(default)]
    pub not_after: Option<String>,
}

/// A newly issued certificate for a watched domain, ready for delivery
#[derive(Debug, Clone)]
pub struct Alert {
    /// The watched domain whose query returned the certificate
    pub domain: String,
    pub issuance: Issuance,
}

impl Alert {
    pub fn new(domain: impl Into<String>, issuance: Issuance) -> Self {
        Self {
            domain: domain.into(),
            issuance,
        }
    }

    pub fn headline(&self) -> String {
        format!(
            ":rotating_light: New certificate issued for {} :rotating_light:",
            self.domain
        )
    }

    /// Validity start, rendered as UTC when it parses as RFC 3339
    pub fn valid_from_text(&self) -> String {
        match self.issuance.not_before.as_deref() {
            Some(raw) => match chrono::DateTime::parse_from_rfc3339(raw) {
                Ok(ts) => ts
                    .with_timezone(&chrono::Utc)
                    .format("%Y-%m-%d %H:%M:%S UTC")
                    .to_string(),
                Err(_) => raw.to_string(),
            },
            None => "unknown".to_string(),
        }
    }

    pub fn dns_names_text(&self) -> String {
        if self.issuance.dns_names.is_empty() {
            "(none)".to_string()
        } else {
            self.issuance.dns_names.join(", ")
        }
    }

    pub fn issuer_text(&self) -> String {
        self.issuance
            .issuer
            .as_ref()
            .map(|issuer| issuer.display_name().to_string())
            .unwrap_or_else(|| "unknown issuer".to_string())
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "New certificate issued for {} (id {}): valid from {} | DNS names: {} | issuer: {}",
            self.domain,
            self.issuance.id,
            self.valid_from_text(),
            self.dns_names_text(),
            self.issuer_text()
        )
    }
}

/// Canonical form of a DNS name: trimmed, lowercase, no trailing dot.
///
/// Returns `None` for empty names and names with characters that cannot
/// appear in a DNS name (which also keeps them safe as file names).
pub fn normalize_domain(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
    if trimmed.is_empty() || trimmed.starts_with('.') || trimmed.contains("..") {
        return None;
    }

    let lower = trimmed.to_ascii_lowercase();
    let valid = lower
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '*'));

    valid.then_some(lower)
}
