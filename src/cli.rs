use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, ValueEnum};
use serde::Deserialize;

/// CT-Tripwire: Certificate Transparency issuance watcher
///
/// Polls the CertSpotter issuance API for a set of domains and raises an
/// alert whenever a new certificate is issued for one of them.
/// Every option can also be supplied through the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "ct-tripwire")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    // ===== Input & Configuration =====
    /// Path to an optional TOML config file
    #[arg(short = 'c', long = "config", env = "CT_TRIPWIRE_CONFIG")]
    pub config: Option<String>,

    /// Comma separated list of domains to monitor
    #[arg(short = 'd', long = "domains", env = "MONITOR_DOMAINS", value_delimiter = ',')]
    pub domains: Vec<String>,

    /// Comma separated DNS names whose certificates never alert
    #[arg(short = 'x', long = "exclude", env = "EXCLUDED_DOMAINS", value_delimiter = ',')]
    pub exclude: Vec<String>,

    // ===== Upstream API =====
    /// CertSpotter API bearer token
    #[arg(long = "api-token", env = "CERTSPOTTER_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Override the CertSpotter API base URL
    #[arg(long = "api-url", env = "CERTSPOTTER_URL")]
    pub api_url: Option<String>,

    // ===== Cursor Store =====
    /// Store cursors in this object-store bucket
    #[arg(long = "bucket", env = "S3_BUCKET")]
    pub bucket: Option<String>,

    /// Object-store region
    #[arg(long = "region", env = "S3_REGION")]
    pub region: Option<String>,

    /// Object-store endpoint (S3-compatible services)
    #[arg(long = "endpoint", env = "S3_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Store cursors as files in this directory
    #[arg(long = "state-dir", env = "STATE_DIR")]
    pub state_dir: Option<String>,

    // ===== Notification =====
    /// Slack-compatible incoming webhook URL (alerts are logged when unset)
    #[arg(long = "webhook", env = "SLACK_WEBHOOK")]
    pub webhook_url: Option<String>,

    // ===== Scheduling =====
    /// Seconds to sleep between poll cycles
    #[arg(short = 'i', long = "interval", env = "POLL_INTERVAL_SECS")]
    pub interval: Option<u64>,

    /// Run a single poll cycle and exit
    #[arg(long = "once")]
    pub once: bool,

    // ===== Logging =====
    /// Debug logging (any DEBUG value other than 0/false/no/off enables it)
    #[arg(
        short = 'v',
        long = "debug",
        env = "DEBUG",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    pub debug: bool,

    /// Log output format
    #[arg(long = "log-format", env = "LOG_FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,
}

impl Cli {
    /// Validate flag combinations and return errors for invalid usage
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bucket.is_some() && self.state_dir.is_some() {
            anyhow::bail!(
                "Cannot specify both --bucket and --state-dir: \
                cursors are kept in exactly one store"
            );
        }

        if self.interval == Some(0) {
            anyhow::bail!("--interval must be greater than 0");
        }

        Ok(())
    }
}

/// Log formatter selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines (default)
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domains_are_comma_separated() {
        let cli = Cli::parse_from(["ct-tripwire", "--domains", "example.com,example.org"]);
        assert_eq!(cli.domains, vec!["example.com", "example.org"]);
    }

    #[test]
    fn test_exclusions_are_comma_separated() {
        let cli = Cli::parse_from(["ct-tripwire", "-x", "test.example.com,dev.example.com"]);
        assert_eq!(cli.exclude.len(), 2);
    }

    #[test]
    fn test_log_format_values() {
        let cli = Cli::parse_from(["ct-tripwire", "--log-format", "json"]);
        assert_eq!(cli.log_format, Some(LogFormat::Json));

        let cli = Cli::parse_from(["ct-tripwire", "--log-format", "text"]);
        assert_eq!(cli.log_format, Some(LogFormat::Text));
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let result = Cli::try_parse_from(["ct-tripwire", "--log-format", "xml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_both_stores_invalid() {
        let cli = Cli::parse_from(["ct-tripwire", "--bucket", "b", "--state-dir", "/tmp/x"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_zero_interval_invalid() {
        let cli = Cli::parse_from(["ct-tripwire", "--interval", "0"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_valid_combination() {
        let cli = Cli::parse_from([
            "ct-tripwire",
            "--state-dir",
            "/tmp/cursors",
            "--interval",
            "300",
            "--once",
        ]);
        assert!(cli.validate().is_ok());
        assert!(cli.once);
        assert_eq!(cli.interval, Some(300));
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::parse_from([
            "ct-tripwire",
            "-c", "tripwire.toml",
            "-d", "example.com",
            "-i", "30",
            "-v",
        ]);
        assert_eq!(cli.config, Some("tripwire.toml".to_string()));
        assert_eq!(cli.domains, vec!["example.com"]);
        assert_eq!(cli.interval, Some(30));
        assert!(cli.debug);
    }

    /// Parse with the DEBUG variable read from `var` instead
    fn parse_with_debug_env(var: &'static str, value: &str) -> Cli {
        use clap::{CommandFactory, FromArgMatches};

        // SAFETY: `var` is unique to the calling test
        unsafe { std::env::set_var(var, value) };
        let matches = Cli::command()
            .mut_arg("debug", |arg| arg.env(var))
            .try_get_matches_from(["ct-tripwire"])
            .unwrap();
        unsafe { std::env::remove_var(var) };
        Cli::from_arg_matches(&matches).unwrap()
    }

    #[test]
    fn test_debug_env_accepts_shell_values() {
        assert!(parse_with_debug_env("CT_TRIPWIRE_TEST_DEBUG_ONE", "1").debug);
        assert!(parse_with_debug_env("CT_TRIPWIRE_TEST_DEBUG_YES", "yes").debug);
        assert!(parse_with_debug_env("CT_TRIPWIRE_TEST_DEBUG_STAR", "*").debug);
    }

    #[test]
    fn test_debug_env_falsey_values_disable() {
        assert!(!parse_with_debug_env("CT_TRIPWIRE_TEST_DEBUG_ZERO", "0").debug);
        assert!(!parse_with_debug_env("CT_TRIPWIRE_TEST_DEBUG_FALSE", "false").debug);
        assert!(!parse_with_debug_env("CT_TRIPWIRE_TEST_DEBUG_EMPTY", "").debug);
    }
}
