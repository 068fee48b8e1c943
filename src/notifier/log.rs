//! Log-only notifier used when no webhook is configured

use crate::notifier::Notifier;
use crate::types::Alert;
use async_trait::async_trait;
use tracing::warn;

/// Writes each alert to the process log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &Alert) -> anyhow::Result<()> {
        warn!(
            domain = %alert.domain,
            cert_id = %alert.issuance.id,
            "{}",
            alert
        );
        Ok(())
    }
}
