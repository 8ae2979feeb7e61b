use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use restock_watcher::config::{AppConfig, ConfigOverrides};
use restock_watcher::dispatcher::AlertDispatcher;
use restock_watcher::extractor::SnapshotExtractor;
use restock_watcher::logging;
use restock_watcher::models::Item;
use restock_watcher::plugins::{DiscordNotifier, LogNotifier, Notifier};
use restock_watcher::registry::ItemRegistry;
use restock_watcher::scheduler::CycleScheduler;
use restock_watcher::scraper::SessionPool;

#[derive(Parser, Debug)]
#[command(name = "restock-watcher", version, about = "Watches product pages and alerts on restocks")]
struct Args {
    /// Configuration file layered over config/default and config/local
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Seconds between cycle starts
    #[arg(long, value_name = "SECONDS")]
    interval: Option<f64>,

    /// Number of browser sessions
    #[arg(long)]
    pool_size: Option<usize>,

    /// Validate the configuration, print the watched items and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let overrides = ConfigOverrides {
        check_interval_secs: args.interval,
        pool_size: args.pool_size,
    };
    let config = AppConfig::load(args.config.as_deref(), &overrides).context("Failed to load configuration")?;

    if args.check_config {
        print_items(&config);
        return Ok(());
    }

    let _log_guard = logging::init_tracing(&config.logging)?;
    info!("Starting Restock Watcher v{}", env!("CARGO_PKG_VERSION"));

    if config.metrics.enabled {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.metrics.port))
            .install()
            .context("Failed to start metrics exporter")?;
        info!("Metrics exporter listening on port {}", config.metrics.port);
    }

    let registry = Arc::new(ItemRegistry::from_config(&config.items));
    let extractor = Arc::new(SnapshotExtractor::new(&config.extraction)?);
    let notifier = build_notifier(&config)?;
    info!("Alerts go to the {} notifier", notifier.name());
    let dispatcher = Arc::new(AlertDispatcher::new(notifier, config.notifications.clone()));

    // More sessions than items would never be used.
    let pool_size = config.monitor.pool_size.min(registry.len());
    info!("Launching {} browser sessions...", pool_size);
    let pool = Arc::new(
        SessionPool::launch(pool_size, &config.scraper)
            .await
            .context("Failed to launch browser sessions")?,
    );

    let scheduler = CycleScheduler::new(
        Arc::clone(&pool),
        registry,
        extractor,
        dispatcher,
        config.monitor.check_interval(),
    );

    if args.once {
        scheduler.run_cycle(1).await;
    } else {
        let cancel = CancellationToken::new();
        tokio::spawn(shutdown_signal(cancel.clone()));
        scheduler.run(cancel).await;
    }

    pool.release_all().await;
    info!("All browser sessions closed");
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown requested, finishing current cycle...");
            cancel.cancel();
        }
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}

fn build_notifier(config: &AppConfig) -> Result<Arc<dyn Notifier>> {
    let notifications = &config.notifications;
    if notifications.discord.webhook_url.is_none() {
        warn!("No Discord webhook configured, restocks will only be logged");
        return Ok(Arc::new(LogNotifier::new()));
    }

    let discord = DiscordNotifier::new(notifications.discord.clone(), notifications.timeout())?;
    Ok(Arc::new(discord))
}

fn print_items(config: &AppConfig) {
    println!(
        "Configuration OK: {} items, {} sessions, {:.1}s interval",
        config.items.len(),
        config.monitor.pool_size,
        config.monitor.check_interval_secs
    );
    println!("{:<4} {:<12} {:<32} {:>6}", "#", "ID", "NAME", "LIMIT");
    for (index, item) in config.items.iter().map(Item::from).enumerate() {
        let limit = item
            .cart_limit
            .map(|l| l.to_string())
            .unwrap_or_else(|| "auto".to_string());
        println!("{:<4} {:<12} {:<32} {:>6}", index, item.id, item.short_name(), limit);
    }
}
