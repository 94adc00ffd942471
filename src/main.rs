use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use deal_watcher::catalog::{CatalogStore, JsonCatalogStore};
use deal_watcher::config::MetricsConfig;
use deal_watcher::models::{Money, NewProduct};
use deal_watcher::plugins::notifiers;
use deal_watcher::scheduler::{shutdown_channel, ShutdownHandle};
use deal_watcher::scraper::{ChromeLauncher, RendererLauncher};
use deal_watcher::{AppConfig, Extractor, ProductManager, ProductScheduler};

#[derive(Debug, Parser)]
#[command(name = "deal-watcher", version, about = "Watches product pages and mails you when a deal shows up")]
struct Cli {
    /// Catalog file (overrides catalog.path)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `deal_watcher=trace`
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also write a daily rolling log file into this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll the catalog (default)
    Run(RunArgs),
    /// Add a product to the catalog
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        /// Alert threshold in rupees
        #[arg(long)]
        threshold: String,
    },
    /// Remove every product with this name
    Remove {
        #[arg(long)]
        name: String,
    },
    /// Render one page and print what the extractor sees
    Check {
        #[arg(long)]
        url: String,
    },
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    /// Run one cycle and exit
    #[arg(long)]
    single_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_level.as_deref(), cli.log_dir.as_deref())?;

    let mut config = AppConfig::from_env().context("Failed to load configuration")?;
    if let Some(path) = &cli.catalog {
        config.catalog.path = path.display().to_string();
    }
    let store = JsonCatalogStore::new(&config.catalog.path);

    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => run(config, store, args.single_run).await,
        Command::Add { name, url, threshold } => {
            let threshold = Money::parse_amount(&threshold)
                .with_context(|| format!("Invalid threshold: {}", threshold))?;
            store.add_product(NewProduct { name: name.clone(), url, threshold }).await?;
            println!("Added {} ({}) to {}", name, threshold, store.path().display());
            Ok(())
        }
        Command::Remove { name } => {
            let removed = store.remove_product(&name).await?;
            println!("Removed {} product(s) named {}", removed, name);
            Ok(())
        }
        Command::Check { url } => check(config, &url).await,
    }
}

fn init_tracing(level: Option<&str>, log_dir: Option<&std::path::Path>) -> Result<Option<WorkerGuard>> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("deal_watcher=info"))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "deal-watcher.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            builder.with_ansi(false).with_writer(writer).init();
            Ok(Some(guard))
        }
        None => {
            builder.init();
            Ok(None)
        }
    }
}

fn install_metrics(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }
    let addr: SocketAddr = config.listen.parse()?;
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!("Serving metrics on http://{}/metrics", addr);
    Ok(())
}

async fn run(config: AppConfig, store: JsonCatalogStore, single_run: bool) -> Result<()> {
    info!("Starting Deal Watcher...");
    install_metrics(&config.metrics)?;

    let notifier = notifiers::from_config(&config.notifications)?;
    let launcher = Arc::new(ChromeLauncher::new(config.scraper.clone()));
    let mut scheduler = ProductScheduler::new(
        Arc::new(store),
        launcher,
        ProductManager::new(notifier),
        config.scheduler.clone(),
        config.scraper.launch_retry_delay(),
    )
    .single_run(single_run);

    let (handle, shutdown) = shutdown_channel();
    tokio::spawn(forward_signals(handle));

    scheduler.run(shutdown).await?;
    info!("Shutting down...");
    Ok(())
}

async fn forward_signals(handle: ShutdownHandle) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Interrupt received, stopping after the current step");
    handle.trigger();
}

async fn check(config: AppConfig, url: &str) -> Result<()> {
    let launcher = ChromeLauncher::new(config.scraper.clone());
    let session = launcher.launch().await?;
    let page = session.render(url).await;
    session.shutdown().await?;

    let observation = Extractor::new().extract(&page?);
    match observation.price {
        Some(price) => println!("Price: {}", price),
        None => println!("Price: not found"),
    }
    println!("Status: {}", observation.stock_label());

    if let Ok(catalog) = JsonCatalogStore::new(&config.catalog.path).load().await {
        if let Some(product) = catalog.tracked().into_iter().find(|p| p.url == url) {
            println!("Threshold: {} ({})", product.threshold, product.name);
        }
    }
    Ok(())
}
