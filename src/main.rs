use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use threshold_exporter::{ConfigManager, Server, Settings};

#[derive(Parser, Debug)]
#[command(name = "threshold-exporter")]
#[command(about = "Serves per-tenant alerting thresholds resolved from hot-reloaded YAML")]
struct Args {
    /// Settings file (TOML, YAML or JSON); THRESHOLD_EXPORTER_* env vars apply on top
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Threshold config file or directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (e.g. 0.0.0.0:8080)
    #[arg(short, long)]
    listen: Option<String>,

    /// Path of the metrics endpoint
    #[arg(long)]
    metrics_path: Option<String>,

    /// Seconds between config change checks
    #[arg(short, long)]
    reload_interval: Option<u64>,

    /// Resolve once, write the records to this JSON file and exit
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Instant to resolve at in export mode (RFC3339, default now)
    #[arg(long, requires = "export")]
    at: Option<DateTime<Utc>>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let settings = resolve_settings(&args)?;

    // Handle export mode (non-interactive)
    if let Some(export_path) = &args.export {
        let at = args.at.unwrap_or_else(Utc::now);
        return export_to_file(&settings.config_path, export_path, at);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(settings))
}

/// Layered settings with command-line flags applied last.
fn resolve_settings(args: &Args) -> Result<Settings> {
    let mut settings = Settings::load(args.settings.as_deref()).context("loading settings")?;

    if let Some(config) = &args.config {
        settings.config_path = config.clone();
    }
    if let Some(listen) = &args.listen {
        settings.listen_addr = listen.clone();
    }
    if let Some(metrics_path) = &args.metrics_path {
        settings.metrics_path = metrics_path.clone();
    }
    if let Some(interval) = args.reload_interval {
        settings.reload_interval_secs = interval;
    }

    settings.validate()?;
    Ok(settings)
}

async fn serve(settings: Settings) -> Result<()> {
    let manager = Arc::new(ConfigManager::new(&settings.config_path));
    manager.load().with_context(|| {
        format!("initial config load from {}", settings.config_path.display())
    })?;

    let addr: SocketAddr = settings
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen address {}", settings.listen_addr))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    let watch = manager.watch(settings.reload_interval());
    let server = Arc::new(Server::new(Arc::clone(&manager), settings.metrics_path.clone()));

    info!(
        listen = %addr,
        metrics_path = settings.metrics_path.as_str(),
        mode = %manager.mode(),
        "threshold exporter started"
    );

    tokio::select! {
        _ = server.run(listener) => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutting down");
        }
    }

    watch.stop();
    Ok(())
}

/// Load the config once and write the resolved records as JSON.
fn export_to_file(config_path: &Path, export_path: &Path, at: DateTime<Utc>) -> Result<()> {
    let manager = ConfigManager::new(config_path);
    manager
        .load()
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    let config = manager
        .config()
        .context("config not available after load")?;

    let export = serde_json::json!({
        "resolved_at": at,
        "mode": manager.mode().as_str(),
        "fingerprint": manager.fingerprint().map(|f| f.to_string()),
        "thresholds": config.resolve_at(at),
        "state_filters": config.resolve_state_filters_at(at),
    });

    let json = serde_json::to_string_pretty(&export)?;
    std::fs::write(export_path, json)
        .with_context(|| format!("writing {}", export_path.display()))?;

    println!("Exported resolved thresholds to {}", export_path.display());
    Ok(())
}
