// src/ct_source/client.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

use super::{FetchOutcome, IssuanceSource};
use crate::config::ApiConfig;
use crate::types::{Cursor, Issuance};

/// HTTP client for the CertSpotter issuances API
/// Endpoint: GET {base_url}/v1/issuances
pub struct CertSpotterClient {
    base_url: String,
    token: String,
    http_client: reqwest::Client,
}

impl CertSpotterClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            http_client,
        })
    }

    fn query_params<'a>(domain: &'a str, cursor: &'a Cursor) -> Vec<(&'static str, &'a str)> {
        let mut params = vec![
            ("domain", domain),
            ("include_subdomains", "true"),
            ("match_wildcards", "true"),
            ("expand", "dns_names"),
            ("expand", "issuer"),
        ];
        if !cursor.is_empty() {
            params.push(("after", cursor.as_str()));
        }
        params
    }
}

#[async_trait]
impl IssuanceSource for CertSpotterClient {
    async fn fetch(&self, domain: &str, cursor: &Cursor) -> FetchOutcome {
        let url = format!("{}/v1/issuances", self.base_url);

        debug!("{}: Fetching issuances after cursor {}", domain, cursor);

        let mut request = self
            .http_client
            .get(&url)
            .query(&Self::query_params(domain, cursor));
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return FetchOutcome::Unreachable(format!("request failed: {}", e)),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            warn!(
                "{}: Rate limited by CertSpotter (retry-after: {})",
                domain,
                retry_after.as_deref().unwrap_or("unspecified")
            );
            return FetchOutcome::RateLimited;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return FetchOutcome::Unreachable(format!("failed to read body: {}", e)),
        };

        classify_response(domain, status, &body)
    }
}

/// Map an HTTP status and body to a [`FetchOutcome`]
pub fn classify_response(domain: &str, status: StatusCode, body: &str) -> FetchOutcome {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return FetchOutcome::RateLimited;
    }

    if !status.is_success() {
        return FetchOutcome::Unreachable(format!("unexpected status {}: {}", status, body.trim()));
    }

    if body.trim().is_empty() {
        return FetchOutcome::Empty;
    }

    let elements: Vec<serde_json::Value> = match serde_json::from_str(body) {
        Ok(elements) => elements,
        Err(e) => {
            warn!(
                "{}: Degraded response (not an issuance array: {}), treating as rate limited",
                domain, e
            );
            return FetchOutcome::RateLimited;
        }
    };

    if elements.is_empty() {
        return FetchOutcome::Empty;
    }

    let mut issuances = Vec::with_capacity(elements.len());
    for (position, element) in elements.into_iter().enumerate() {
        match serde_json::from_value::<Issuance>(element) {
            Ok(issuance) => issuances.push(issuance),
            Err(e) => {
                warn!(
                    "{}: Degraded response (element {} unusable: {}), treating as rate limited",
                    domain, position, e
                );
                return FetchOutcome::RateLimited;
            }
        }
    }

    debug!("{}: Received {} issuances", domain, issuances.len());
    FetchOutcome::Batch(issuances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> CertSpotterClient {
        let config = ApiConfig {
            base_url: server.uri(),
            token: "test-token".to_string(),
            timeout_secs: 2,
            ..ApiConfig::default()
        };
        CertSpotterClient::new(&config).unwrap()
    }

    #[test]
    fn test_classify_empty_body() {
        assert_eq!(classify_response("example.com", StatusCode::OK, ""), FetchOutcome::Empty);
        assert_eq!(classify_response("example.com", StatusCode::OK, " \n"), FetchOutcome::Empty);
        assert_eq!(classify_response("example.com", StatusCode::OK, "[]"), FetchOutcome::Empty);
    }

    #[test]
    fn test_classify_batch_keeps_order() {
        let body = r#"[{"id": "101", "dns_names": ["a.example.com"]}, {"id": "102"}]"#;
        match classify_response("example.com", StatusCode::OK, body) {
            FetchOutcome::Batch(issuances) => {
                let ids: Vec<&str> = issuances.iter().map(|i| i.id.as_str()).collect();
                assert_eq!(ids, vec!["101", "102"]);
            }
            other => panic!("expected batch, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_missing_id_is_degraded() {
        let body = r#"[{"id": "101"}, {"dns_names": ["a.example.com"]}]"#;
        assert_eq!(
            classify_response("example.com", StatusCode::OK, body),
            FetchOutcome::RateLimited
        );
    }

    #[test]
    fn test_classify_error_object_is_degraded() {
        let body = r#"{"code": "rate_limited", "message": "You have exceeded the rate limit"}"#;
        assert_eq!(
            classify_response("example.com", StatusCode::OK, body),
            FetchOutcome::RateLimited
        );
    }

    #[test]
    fn test_classify_statuses() {
        assert_eq!(
            classify_response("example.com", StatusCode::TOO_MANY_REQUESTS, ""),
            FetchOutcome::RateLimited
        );
        assert!(matches!(
            classify_response("example.com", StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            FetchOutcome::Unreachable(_)
        ));
        assert!(matches!(
            classify_response("example.com", StatusCode::UNAUTHORIZED, "bad token"),
            FetchOutcome::Unreachable(_)
        ));
    }

    #[tokio::test]
    async fn test_fetch_sends_expected_query() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/issuances"))
            .and(query_param("domain", "example.com"))
            .and(query_param("include_subdomains", "true"))
            .and(query_param("match_wildcards", "true"))
            .and(query_param("after", "100"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"id": "101", "dns_names": ["api.example.com"], "issuer": {"friendly_name": "Let's Encrypt"}, "not_before": "2024-01-01T00:00:00Z"}]"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client_for(&server)
            .fetch("example.com", &Cursor::new("100"))
            .await;

        match outcome {
            FetchOutcome::Batch(issuances) => {
                assert_eq!(issuances.len(), 1);
                assert_eq!(issuances[0].id, "101");
                assert_eq!(issuances[0].dns_names, vec!["api.example.com"]);
            }
            other => panic!("expected batch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_omits_after_for_empty_cursor() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/issuances"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client_for(&server).fetch("example.com", &Cursor::empty()).await;
        assert_eq!(outcome, FetchOutcome::Empty);

        let requests = server.received_requests().await.unwrap();
        assert!(!requests[0].url.query().unwrap_or_default().contains("after="));
    }

    #[tokio::test]
    async fn test_fetch_rate_limited() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "60"))
            .mount(&server)
            .await;

        let outcome = client_for(&server).fetch("example.com", &Cursor::new("1")).await;
        assert_eq!(outcome, FetchOutcome::RateLimited);
    }

    #[tokio::test]
    async fn test_fetch_unreachable() {
        let config = ApiConfig {
            // Port 9 (discard) on localhost is not expected to accept HTTP
            base_url: "http://127.0.0.1:9".to_string(),
            token: String::new(),
            timeout_secs: 2,
            ..ApiConfig::default()
        };
        let client = CertSpotterClient::new(&config).unwrap();

        let outcome = client.fetch("example.com", &Cursor::empty()).await;
        assert!(matches!(outcome, FetchOutcome::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_unreachable() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("[]")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let config = ApiConfig {
            base_url: server.uri(),
            token: String::new(),
            timeout_secs: 1,
            ..ApiConfig::default()
        };
        let client = CertSpotterClient::new(&config).unwrap();

        let outcome = client.fetch("example.com", &Cursor::empty()).await;
        assert!(matches!(outcome, FetchOutcome::Unreachable(_)));
    }
}
