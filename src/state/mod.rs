// src/state/mod.rs
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::StoreConfig;
use crate::types::Cursor;

pub mod file;
pub mod object;
pub mod sigv4;

pub use file::FileCursorStore;
pub use object::{ObjectCursorStore, ObjectStoreCredentials};

/// Durable mapping from watched domain to its cursor
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Whether a cursor has been recorded for the domain
    async fn exists(&self, domain: &str) -> Result<bool>;

    /// Read the recorded cursor. Only meaningful after `exists` returned true
    async fn read(&self, domain: &str) -> Result<Cursor>;

    /// Overwrite the recorded cursor. Idempotent
    async fn write(&self, domain: &str, cursor: &Cursor) -> Result<()>;

    /// Human-readable location, for log lines
    fn describe(&self) -> String;
}

/// Build the single backend selected by the configuration
pub fn from_config(config: &StoreConfig) -> Result<Arc<dyn CursorStore>> {
    let bucket = config.bucket.as_deref().filter(|b| !b.is_empty());
    let directory = config.directory.as_deref().filter(|d| !d.is_empty());

    match (bucket, directory) {
        (Some(bucket), None) => {
            let region = config.region.clone().unwrap_or_else(|| "us-east-1".to_string());
            let endpoint = config
                .endpoint
                .clone()
                .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", region));
            let credentials = ObjectStoreCredentials::from_env()?;
            let store = ObjectCursorStore::new(
                &endpoint,
                bucket,
                &region,
                credentials,
                Duration::from_secs(config.timeout_secs),
            )?;
            info!("Using object-store cursor storage: {}", store.describe());
            Ok(Arc::new(store))
        }
        (None, Some(directory)) => {
            let store = FileCursorStore::new(PathBuf::from(directory));
            info!("Using file-based cursor storage: {}", store.describe());
            Ok(Arc::new(store))
        }
        (Some(_), Some(_)) => {
            anyhow::bail!("Both a bucket and a state directory are configured; choose one")
        }
        (None, None) => anyhow::bail!("No cursor store configured"),
    }
}
