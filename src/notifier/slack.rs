//! Slack-compatible incoming webhook notifier

use crate::config::WebhookConfig;
use crate::notifier::Notifier;
use crate::types::Alert;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

#[derive(Clone)]
pub struct SlackNotifier {
    client: Client,
    cfg: WebhookConfig,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct SlackPayload {
    pub attachments: Vec<Attachment>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct Attachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Attachment {
    fn field(title: &str, text: String, color: &str) -> Self {
        Self {
            fallback: None,
            pretext: None,
            title: Some(title.to_string()),
            text: Some(text),
            color: Some(color.to_string()),
        }
    }
}

impl SlackPayload {
    /// Headline attachment followed by validity, names and issuer
    pub fn from_alert(alert: &Alert, color: &str) -> Self {
        let headline = alert.headline();
        Self {
            attachments: vec![
                Attachment {
                    fallback: Some(headline.clone()),
                    pretext: Some(headline),
                    title: None,
                    text: None,
                    color: None,
                },
                Attachment::field("Certificate Valid from: ", alert.valid_from_text(), color),
                Attachment::field("DNS Names: ", alert.dns_names_text(), color),
                Attachment::field("Issuer: ", alert.issuer_text(), color),
            ],
        }
    }
}

impl SlackNotifier {
    pub fn new(cfg: WebhookConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build webhook HTTP client")?;
        Ok(Self { client, cfg })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, alert: &Alert) -> anyhow::Result<()> {
        let payload = SlackPayload::from_alert(alert, &self.cfg.color);

        let timeout_secs = self.cfg.timeout_secs.unwrap_or(5);
        let resp = self
            .client
            .post(&self.cfg.url)
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .json(&payload)
            .send()
            .await
            .context("Webhook request failed")?;
        resp.error_for_status()?; // non-2xx -> error

        debug!("Webhook alert delivered for {} (id {})", alert.domain, alert.issuance.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Issuance, Issuer};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_alert() -> Alert {
        Alert::new(
            "example.com",
            Issuance {
                id: "101".to_string(),
                dns_names: vec!["example.com".to_string(), "www.example.com".to_string()],
                issuer: Some(Issuer {
                    name: Some("C=US, O=Let's Encrypt, CN=R3".to_string()),
                    friendly_name: Some("Let's Encrypt".to_string()),
                }),
                not_before: Some("2024-01-01T00:00:00Z".to_string()),
                not_after: None,
            },
        )
    }

    fn config_for(server: &MockServer, timeout_secs: u64) -> WebhookConfig {
        WebhookConfig {
            url: format!("{}/hook", server.uri()),
            timeout_secs: Some(timeout_secs),
            color: "#FF0000".to_string(),
        }
    }

    #[tokio::test]
    async fn test_notify_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("Content-Type", "application/json"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let notifier = SlackNotifier::new(config_for(&mock_server, 5)).unwrap();

        assert!(notifier.notify(&create_test_alert()).await.is_ok());
    }

    #[tokio::test]
    async fn test_notify_payload_structure() {
        let mock_server = MockServer::start().await;

        let headline = ":rotating_light: New certificate issued for example.com :rotating_light:";
        let expected_json = serde_json::json!({
            "attachments": [
                {"fallback": headline, "pretext": headline},
                {"title": "Certificate Valid from: ", "text": "2024-01-01 00:00:00 UTC", "color": "#FF0000"},
                {"title": "DNS Names: ", "text": "example.com, www.example.com", "color": "#FF0000"},
                {"title": "Issuer: ", "text": "Let's Encrypt", "color": "#FF0000"}
            ]
        });

        Mock::given(method("POST"))
            .and(body_json(&expected_json))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let notifier = SlackNotifier::new(config_for(&mock_server, 5)).unwrap();

        assert!(notifier.notify(&create_test_alert()).await.is_ok());
    }

    #[tokio::test]
    async fn test_notify_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let notifier = SlackNotifier::new(config_for(&mock_server, 5)).unwrap();

        assert!(notifier.notify(&create_test_alert()).await.is_err());
    }

    #[tokio::test]
    async fn test_notify_timeout() {
        let mock_server = MockServer::start().await;

        // Delay response longer than timeout
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(10)),
            )
            .mount(&mock_server)
            .await;

        let notifier = SlackNotifier::new(config_for(&mock_server, 1)).unwrap();

        assert!(notifier.notify(&create_test_alert()).await.is_err());
    }

    #[test]
    fn test_payload_uses_configured_color() {
        let payload = SlackPayload::from_alert(&create_test_alert(), "#FFA500");

        assert_eq!(payload.attachments.len(), 4);
        assert!(payload.attachments[0].color.is_none());
        assert!(payload.attachments[1..]
            .iter()
            .all(|a| a.color.as_deref() == Some("#FFA500")));
    }
}
