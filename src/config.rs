// src/config.rs

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::cli::{Cli, LogFormat};
use crate::types::normalize_domain;

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_bootstrap_page_limit")]
    pub bootstrap_page_limit: u32,
}

fn default_api_base_url() -> String {
    "https://api.certspotter.com".to_string()
}
fn default_api_timeout() -> u64 { 30 }
fn default_bootstrap_page_limit() -> u32 { 10 }

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            token: String::new(),
            timeout_secs: default_api_timeout(),
            bootstrap_page_limit: default_bootstrap_page_limit(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

fn default_poll_interval() -> u64 { 3600 }
fn default_failure_threshold() -> u32 { 3 }

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

/// Cursor persistence. Exactly one of `bucket` and `directory` must be set.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub directory: Option<String>,
    /// Per-request timeout for the object-store backend
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

fn default_store_timeout() -> u64 { 30 }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            region: None,
            endpoint: None,
            directory: None,
            timeout_secs: default_store_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_webhook_color")]
    pub color: String,
}

fn default_webhook_color() -> String {
    "#FF0000".to_string()
}

impl WebhookConfig {
    pub fn new(url: String) -> Self {
        Self {
            url,
            timeout_secs: None,
            color: default_webhook_color(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub exclusions: Vec<String>,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    /// Build the effective configuration: file (if any), then CLI/env overrides
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match cli.config {
            Some(ref path) => Self::from_file(Path::new(path))?,
            None => Self::default(),
        };
        config.apply_cli(cli);
        Ok(config)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if !cli.domains.is_empty() {
            self.domains = cli.domains.clone();
        }
        if !cli.exclude.is_empty() {
            self.exclusions = cli.exclude.clone();
        }

        if let Some(ref token) = cli.api_token {
            self.api.token = token.clone();
        }
        if let Some(ref base_url) = cli.api_url {
            self.api.base_url = base_url.clone();
        }
        if let Some(interval) = cli.interval {
            self.poll.interval_secs = interval;
        }

        // A store chosen on the command line replaces the file's choice
        // entirely, so the two backends never end up both configured.
        if let Some(ref bucket) = cli.bucket {
            self.store.bucket = Some(bucket.clone());
            self.store.directory = None;
        }
        if let Some(ref directory) = cli.state_dir {
            self.store.directory = Some(directory.clone());
            if cli.bucket.is_none() {
                self.store.bucket = None;
            }
        }
        if let Some(ref region) = cli.region {
            self.store.region = Some(region.clone());
        }
        if let Some(ref endpoint) = cli.endpoint {
            self.store.endpoint = Some(endpoint.clone());
        }

        // A blank SLACK_WEBHOOK means "log alerts instead"
        match cli.webhook_url.as_deref().map(str::trim) {
            Some("") => self.webhook = None,
            Some(url) => match self.webhook {
                Some(ref mut webhook) => webhook.url = url.to_string(),
                None => self.webhook = Some(WebhookConfig::new(url.to_string())),
            },
            None => {}
        }

        if cli.debug {
            self.logging.level = "debug".to_string();
        }
        if let Some(format) = cli.log_format {
            self.logging.format = format;
        }
    }

    /// Normalized, de-duplicated watch list in configuration order
    pub fn monitored_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = Vec::new();
        for domain in self.domains.iter().filter_map(|d| normalize_domain(d)) {
            if !domains.contains(&domain) {
                domains.push(domain);
            }
        }
        domains
    }

    /// The webhook to deliver alerts to, if one is set with a non-blank URL
    pub fn active_webhook(&self) -> Option<&WebhookConfig> {
        self.webhook
            .as_ref()
            .filter(|webhook| !webhook.url.trim().is_empty())
    }

    /// Reject configurations the poll loop cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(bad) = self
            .domains
            .iter()
            .find(|d| normalize_domain(d).is_none())
        {
            anyhow::bail!("Invalid domain in watch list: {:?}", bad);
        }

        if let Some(bad) = self
            .exclusions
            .iter()
            .filter(|d| !d.trim().is_empty())
            .find(|d| normalize_domain(d).is_none())
        {
            anyhow::bail!("Invalid DNS name in exclusion list: {:?}", bad);
        }

        if self.monitored_domains().is_empty() {
            anyhow::bail!(
                "No domains to monitor. Set MONITOR_DOMAINS, --domains, or `domains` in the config file"
            );
        }

        if self.api.token.trim().is_empty() {
            anyhow::bail!(
                "CertSpotter API token is required. Set CERTSPOTTER_TOKEN, --api-token, or [api].token"
            );
        }

        if self.api.bootstrap_page_limit == 0 {
            anyhow::bail!("[api].bootstrap_page_limit must be greater than 0");
        }

        url::Url::parse(&self.api.base_url)
            .with_context(|| format!("Invalid API base URL {:?}", self.api.base_url))?;

        let bucket = self.store.bucket.as_deref().filter(|b| !b.is_empty());
        let directory = self.store.directory.as_deref().filter(|d| !d.is_empty());
        match (bucket, directory) {
            (Some(_), Some(_)) => anyhow::bail!(
                "Both an object-store bucket and a state directory are configured. Choose one"
            ),
            (None, None) => anyhow::bail!(
                "No cursor store configured. Set S3_BUCKET/--bucket or STATE_DIR/--state-dir"
            ),
            _ => {}
        }

        if let Some(ref endpoint) = self.store.endpoint {
            url::Url::parse(endpoint)
                .with_context(|| format!("Invalid object-store endpoint {:?}", endpoint))?;
        }

        if self.poll.interval_secs == 0 {
            anyhow::bail!("Poll interval must be greater than 0");
        }

        if self.store.timeout_secs == 0 {
            anyhow::bail!("[store].timeout_secs must be greater than 0");
        }

        if let Some(webhook) = self.active_webhook() {
            url::Url::parse(&webhook.url)
                .with_context(|| format!("Invalid webhook URL {:?}", webhook.url))?;
        }

        Ok(())
    }
}
