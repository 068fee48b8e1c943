//! Alert delivery for newly issued certificates
//!
//! Delivery failures are reported to the caller, which logs them and moves
//! on: a failed alert never blocks cursor advancement.

use crate::config::WebhookConfig;
use crate::types::Alert;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub mod log;
pub mod slack;

pub use log::LogNotifier;
pub use slack::SlackNotifier;

/// Sink for one alert per newly issued certificate
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> anyhow::Result<()>;
}

/// Webhook delivery when configured, process log otherwise
pub fn from_config(webhook: Option<&WebhookConfig>) -> anyhow::Result<Arc<dyn Notifier>> {
    match webhook {
        Some(config) => {
            info!("Webhook notifications enabled");
            Ok(Arc::new(SlackNotifier::new(config.clone())?))
        }
        None => {
            info!("No webhook configured, alerts will be written to the log");
            Ok(Arc::new(LogNotifier))
        }
    }
}
