// src/main.rs
use clap::Parser;
use ct_tripwire::cli::{Cli, LogFormat};
use ct_tripwire::config::Config;
use ct_tripwire::ct_source::CertSpotterClient;
use ct_tripwire::filter::ExclusionFilter;
use ct_tripwire::notifier;
use ct_tripwire::scheduler::Scheduler;
use ct_tripwire::state;
use ct_tripwire::stats::StatsCollector;
use ct_tripwire::tracker::{DomainTracker, TrackerConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments (flags and their environment variables)
    let cli = Cli::parse();
    cli.validate()?;

    // Config file, if any, then CLI/env overrides
    let config = Config::load(&cli)?;

    // Initialize logging
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init(),
    }

    tracing::info!("Starting ct-tripwire...");

    config.validate()?;

    let domains = config.monitored_domains();
    tracing::info!("Loaded watch list: {} domains", domains.len());

    let exclusions = ExclusionFilter::from_list(&config.exclusions);
    if exclusions.count() > 0 {
        tracing::info!("Loaded exclusion list: {} names", exclusions.count());
    }

    let source = Arc::new(CertSpotterClient::new(&config.api)?);
    tracing::info!("Querying issuances from {}", config.api.base_url);

    let store = state::from_config(&config.store)?;
    let notifier = notifier::from_config(config.active_webhook())?;

    let stats = StatsCollector::new();
    let tracker = DomainTracker::new(
        source,
        store,
        notifier,
        exclusions,
        TrackerConfig {
            bootstrap_page_limit: config.api.bootstrap_page_limit,
            failure_threshold: config.poll.failure_threshold,
        },
        stats.clone(),
    );

    let mut scheduler = Scheduler::new(
        domains,
        tracker,
        Duration::from_secs(config.poll.interval_secs),
        stats.clone(),
    );

    if cli.once {
        tracing::info!("Running a single poll cycle");
        scheduler.run_cycle().await?;
    } else {
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Received Ctrl+C, finishing current cycle...");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => {
                    tracing::error!("Failed to listen for Ctrl+C: {}", e);
                    // Keep the sender alive so the scheduler is not stopped
                    shutdown_tx.closed().await;
                }
            }
        });

        scheduler.run(shutdown_rx).await?;
    }

    tracing::info!("Final stats: {}", stats.format_stats());
    tracing::info!("ct-tripwire stopped");

    Ok(())
}
