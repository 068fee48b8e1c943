// src/state/object.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::CursorStore;
use super::sigv4::{self, SignableRequest, SigningKey};
use crate::types::Cursor;

/// Access key pair for the object store
#[derive(Clone)]
pub struct ObjectStoreCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl ObjectStoreCredentials {
    /// Read the standard `AWS_*` credential variables
    pub fn from_env() -> Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .context("AWS_ACCESS_KEY_ID is required for the object-store cursor backend")?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .context("AWS_SECRET_ACCESS_KEY is required for the object-store cursor backend")?;
        let session_token = std::env::var("AWS_SESSION_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

impl std::fmt::Debug for ObjectStoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// S3-compatible bucket with one object per domain.
///
/// Object body is the JSON-encoded cursor string. Requests use path-style
/// addressing (`{endpoint}/{bucket}/{domain}`) and SigV4 signing.
pub struct ObjectCursorStore {
    endpoint: Url,
    bucket: String,
    region: String,
    credentials: ObjectStoreCredentials,
    http_client: reqwest::Client,
}

impl ObjectCursorStore {
    pub fn new(
        endpoint: &str,
        bucket: &str,
        region: &str,
        credentials: ObjectStoreCredentials,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("Invalid object-store endpoint {:?}", endpoint))?;
        if endpoint.host_str().is_none() {
            anyhow::bail!("Object-store endpoint {} has no host", endpoint);
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            endpoint,
            bucket: bucket.to_string(),
            region: region.to_string(),
            credentials,
            http_client,
        })
    }

    fn object_path(&self, domain: &str) -> String {
        let base = self.endpoint.path().trim_end_matches('/');
        format!(
            "{}/{}/{}",
            base,
            sigv4::uri_encode(&self.bucket),
            sigv4::uri_encode(domain)
        )
    }

    fn host_header(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// Send a signed request for the domain's object
    async fn send(
        &self,
        method: Method,
        domain: &str,
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Response> {
        let path = self.object_path(domain);
        let mut url = self.endpoint.clone();
        url.set_path(&path);

        let payload_sha256 = match body {
            Some(ref bytes) => sigv4::sha256_hex(bytes),
            None => sigv4::EMPTY_PAYLOAD_SHA256.to_string(),
        };
        let host = self.host_header();

        let key = SigningKey {
            access_key_id: &self.credentials.access_key_id,
            secret_access_key: &self.credentials.secret_access_key,
            session_token: self.credentials.session_token.as_deref(),
            region: &self.region,
            service: "s3",
        };
        let request = SignableRequest {
            method: method.as_str(),
            host: &host,
            canonical_uri: &path,
            payload_sha256: &payload_sha256,
            extra_headers: &[],
        };
        let signed_headers = sigv4::sign(&key, &request, chrono::Utc::now())?;

        let mut builder = self.http_client.request(method.clone(), url);
        for (name, value) in signed_headers {
            builder = builder.header(name, value);
        }
        if let Some(bytes) = body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(bytes);
        }

        builder
            .send()
            .await
            .with_context(|| format!("Object-store {} request for {} failed", method, domain))
    }
}

#[async_trait]
impl CursorStore for ObjectCursorStore {
    async fn exists(&self, domain: &str) -> Result<bool> {
        let response = self.send(Method::HEAD, domain, None).await?;

        match response.status() {
            status if status.is_success() => {
                debug!("Cursor object exists for {}", domain);
                Ok(true)
            }
            // A missing object can surface as 403 when the credentials lack
            // list permission on the bucket.
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => {
                info!(
                    "No cursor object for {} (status {}), domain is not tracked yet",
                    domain,
                    response.status()
                );
                Ok(false)
            }
            status => anyhow::bail!(
                "Unexpected status {} probing cursor object for {}",
                status,
                domain
            ),
        }
    }

    async fn read(&self, domain: &str) -> Result<Cursor> {
        let response = self.send(Method::GET, domain, None).await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read cursor object body")?;

        if !status.is_success() {
            anyhow::bail!(
                "Reading cursor object for {} failed with status {}: {}",
                domain,
                status,
                body
            );
        }

        let cursor: Cursor = serde_json::from_str(&body)
            .with_context(|| format!("Cursor object for {} is not a JSON string", domain))?;
        Ok(cursor)
    }

    async fn write(&self, domain: &str, cursor: &Cursor) -> Result<()> {
        let body = serde_json::to_vec(cursor).context("Failed to encode cursor")?;
        let response = self.send(Method::PUT, domain, Some(body)).await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Writing cursor object for {} failed with status {}: {}",
                domain,
                status,
                text
            );
        }

        debug!("Cursor for {} saved to bucket {}", domain, self.bucket);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("bucket {} at {} ({})", self.bucket, self.endpoint, self.region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_with_timeout(server: &MockServer, timeout: Duration) -> ObjectCursorStore {
        let credentials = ObjectStoreCredentials {
            access_key_id: "AKIDTEST".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: None,
        };
        ObjectCursorStore::new(&server.uri(), "cursors", "us-east-1", credentials, timeout).unwrap()
    }

    fn store_for(server: &MockServer) -> ObjectCursorStore {
        store_with_timeout(server, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_exists_true_on_200() {
        let server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/cursors/example.com"))
            .and(header_exists("authorization"))
            .and(header_exists("x-amz-date"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        assert!(store_for(&server).exists("example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_false_on_404_and_403() {
        let server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/cursors/missing.example"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/cursors/forbidden.example"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let store = store_for(&server);
        assert!(!store.exists("missing.example").await.unwrap());
        assert!(!store.exists("forbidden.example").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_errors_on_server_failure() {
        let server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(store_for(&server).exists("example.com").await.is_err());
    }

    #[tokio::test]
    async fn test_read_decodes_json_string() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/cursors/example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#""102""#))
            .mount(&server)
            .await;

        let cursor = store_for(&server).read("example.com").await.unwrap();
        assert_eq!(cursor, Cursor::new("102"));
    }

    #[tokio::test]
    async fn test_read_rejects_non_json_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("102"))
            .mount(&server)
            .await;

        // A bare number is valid JSON but not a string cursor
        assert!(store_for(&server).read("example.com").await.is_err());
    }

    #[tokio::test]
    async fn test_write_puts_json_encoded_cursor() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/cursors/example.com"))
            .and(header("content-type", "application/json"))
            .and(header_exists("x-amz-content-sha256"))
            .and(body_string(r#""102""#))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        store_for(&server)
            .write("example.com", &Cursor::new("102"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_write_failure_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = store_for(&server)
            .write("example.com", &Cursor::new("102"))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_object_path_encodes_wildcard_domain() {
        let credentials = ObjectStoreCredentials {
            access_key_id: "a".to_string(),
            secret_access_key: "b".to_string(),
            session_token: None,
        };
        let store =
            ObjectCursorStore::new(
                "https://s3.eu-west-1.amazonaws.com",
                "ct",
                "eu-west-1",
                credentials,
                Duration::from_secs(30),
            )
            .unwrap();

        assert_eq!(store.object_path("*.example.com"), "/ct/%2A.example.com");
        assert_eq!(store.host_header(), "s3.eu-west-1.amazonaws.com");
        assert!(!format!("{:?}", store.credentials).contains("\"b\""));
    }

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;

        let store = store_with_timeout(&server, Duration::from_secs(1));

        assert!(store.exists("example.com").await.is_err());
    }
}
