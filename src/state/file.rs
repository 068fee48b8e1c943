// src/state/file.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

use super::CursorStore;
use crate::types::Cursor;

/// One file per domain inside a directory, holding the raw cursor string
pub struct FileCursorStore {
    directory: PathBuf,
}

impl FileCursorStore {
    /// The directory is created on first write
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }

    fn path_for(&self, domain: &str) -> PathBuf {
        self.directory.join(domain)
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    async fn exists(&self, domain: &str) -> Result<bool> {
        let path = self.path_for(domain);
        fs::try_exists(&path)
            .await
            .with_context(|| format!("Failed to check cursor file {:?}", path))
    }

    async fn read(&self, domain: &str) -> Result<Cursor> {
        let path = self.path_for(domain);
        let contents = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read cursor file {:?}", path))?;
        Ok(Cursor::new(contents.trim_end()))
    }

    async fn write(&self, domain: &str, cursor: &Cursor) -> Result<()> {
        fs::create_dir_all(&self.directory)
            .await
            .with_context(|| format!("Failed to create state directory {:?}", self.directory))?;

        let path = self.path_for(domain);

        // Write to temporary file first, then rename for atomicity
        let temp_path = self.directory.join(format!(".{}.tmp", domain));

        fs::write(&temp_path, cursor.as_str())
            .await
            .context("Failed to write cursor to temporary file")?;

        fs::rename(&temp_path, &path)
            .await
            .context("Failed to rename temporary cursor file")?;

        debug!("Cursor for {} saved to {:?}", domain, path);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("directory {}", self.directory.display())
    }
}
