use anyhow::{Context, Result};
use clap::Parser;
use file_watcher::config::{LogFormat, ServiceConfig};
use file_watcher::{
    ConfigError, FileWatcher, GatewayClient, IngestedStore, Overrides, S3BucketScanner,
    WatcherConfig, WatcherStats,
};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit status when a required setting (the bucket) is missing
const EXIT_MISSING_CONFIG: i32 = 66;
/// Exit status for any other configuration problem
const EXIT_BAD_CONFIG: i32 = 78;

/// Ingest files based on S3 uploads
#[derive(Debug, Parser)]
#[command(name = "file-watcher", version)]
struct Cli {
    /// S3 bucket to watch
    #[arg(short = 'b', long = "bucket", env = "s3.bucket.name")]
    bucket: Option<String>,

    /// S3 access key
    #[arg(short = 'a', long = "access-key", env = "s3.key.access")]
    access_key: Option<String>,

    /// S3 private key
    #[arg(short = 'p', long = "private-key", env = "s3.key.private", hide_env_values = true)]
    private_key: Option<String>,

    /// Piazza API key
    #[arg(long = "pz", visible_alias = "api-key", env = "pz.api.key", hide_env_values = true)]
    api_key: Option<String>,

    /// Piazza gateway host name
    #[arg(short = 'g', long = "gateway")]
    gateway: Option<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            bucket: self.bucket.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.private_key.clone(),
            api_key: self.api_key.clone(),
            gateway_host: self.gateway.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match WatcherConfig::load(&cli.overrides()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("file-watcher: {}", e);
            let code = match e {
                ConfigError::MissingRequired(_) => {
                    eprintln!("S3 bucket must be specified using the -b argument.");
                    EXIT_MISSING_CONFIG
                }
                _ => EXIT_BAD_CONFIG,
            };
            std::process::exit(code);
        }
    };

    // Initialize logging
    init_tracing(&config.service);

    info!(
        service = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        bucket = %config.storage.bucket,
        "Starting file watcher"
    );

    if let Some(port) = config.service.metrics_port {
        init_metrics(port)?;
    }

    // Initialize components
    let store = IngestedStore::open(&config.polling.ingested_file)
        .context("Failed to load ingested file set")?;
    info!(
        path = %store.path().display(),
        known_files = store.len(),
        "Loaded ingested file set"
    );

    let scanner = S3BucketScanner::new(&config.storage).await;

    let gateway =
        GatewayClient::new(&config.gateway).context("Failed to initialize gateway client")?;

    info!(
        bucket = scanner.bucket(),
        job_url = gateway.job_url(),
        "Watching bucket"
    );

    let mut watcher = FileWatcher::new(&config, scanner, gateway, store);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    info!("Listening for new files. This will continuously poll until the process is terminated.");

    match watcher.run(shutdown_rx).await {
        Ok(stats) => {
            log_final_stats(&stats);
            info!("File watcher stopped");
            Ok(())
        }
        Err(e) => {
            log_final_stats(watcher.stats());
            error!(error = %e, "File watcher aborted");
            Err(e).context("Cannot continue without a reliable ingested file set")
        }
    }
}

/// Initialize tracing/logging
fn init_tracing(config: &ServiceConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
    }
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}

fn log_final_stats(stats: &WatcherStats) {
    info!(
        cycles = stats.cycles,
        scan_failures = stats.scan_failures,
        submitted = stats.submitted,
        ingested = stats.ingested,
        rejected = stats.rejected,
        transport_errors = stats.transport_errors,
        "Final watcher stats"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_map_to_overrides() {
        let cli = Cli::try_parse_from([
            "file-watcher",
            "-b",
            "uploads",
            "-a",
            "AKIA",
            "-p",
            "secret",
            "--pz",
            "pz-key",
            "-g",
            "localhost:8081",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert_eq!(overrides.bucket.as_deref(), Some("uploads"));
        assert_eq!(overrides.access_key.as_deref(), Some("AKIA"));
        assert_eq!(overrides.secret_key.as_deref(), Some("secret"));
        assert_eq!(overrides.api_key.as_deref(), Some("pz-key"));
        assert_eq!(overrides.gateway_host.as_deref(), Some("localhost:8081"));
    }

    #[test]
    fn test_api_key_alias() {
        let cli = Cli::try_parse_from(["file-watcher", "--api-key", "k"]).unwrap();
        assert_eq!(cli.overrides().api_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
