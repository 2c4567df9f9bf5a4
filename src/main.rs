//! blobcheck -- blob service binding diagnostics.
//!
//! Startup resolves the binding exactly once.  A broken binding (services
//! bound but none with our label, or incomplete credentials) aborts the
//! process before the listener opens.

use std::future::IntoFuture;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use blobcheck::binding::{self, Binding, PlatformEnv, ServiceDescriptor};
use blobcheck::checker::RoundTripChecker;
use blobcheck::config::Config;
use blobcheck::logging::init_tracing;
use blobcheck::storage::backend::ObjectStore;
use blobcheck::storage::s3::S3ObjectStore;

/// Command-line arguments for blobcheck.
#[derive(Parser, Debug)]
#[command(
    name = "blobcheck",
    version,
    about = "Verifies a bound blob storage service"
)]
struct Cli {
    /// Path to an optional YAML configuration file.
    #[arg(short, long)]
    config: Option<String>,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => blobcheck::config::load_config(path)?,
        None => Config::default(),
    };
    config.apply_env_overrides(|name| std::env::var(name).ok())?;

    init_tracing(&config)?;
    info!("Starting...");
    if let Some(path) = &cli.config {
        info!("Loaded configuration from {}", path);
    }
    info!("Blob service label = {}", config.binding.service_label);

    let platform = PlatformEnv::from_env()?;
    let resolved = binding::resolve(
        &platform,
        &config.binding.service_label,
        &config.binding.region,
    )?;
    let descriptor = ServiceDescriptor::from_platform(&platform, &config.binding);

    let store: Option<Arc<dyn ObjectStore>> = match &resolved {
        Binding::Bound(binding_config) => {
            let store: Arc<dyn ObjectStore> =
                Arc::new(S3ObjectStore::new(binding_config, &config.storage).await?);
            Some(store)
        }
        Binding::Unbound => {
            warn!("No blob service bound; /ping will ask to be bound");
            None
        }
    };

    if config.observability.metrics {
        blobcheck::metrics::init_metrics()?;
        blobcheck::metrics::describe_metrics();
        info!("Prometheus metrics initialized");
    }

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));
    let shutdown_timeout = std::time::Duration::from_secs(config.server.shutdown_timeout);

    let state = Arc::new(blobcheck::AppState {
        checker: RoundTripChecker::new(store, config.check.clone()),
        descriptor,
        config,
    });

    let app = blobcheck::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);

    // In-flight round trips get `shutdown_timeout` to finish after a signal.
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();
    tokio::select! {
        result = server => result?,
        _ = async {
            shutdown_signal().await;
            tokio::time::sleep(shutdown_timeout).await;
        } => warn!("Shutdown timeout elapsed; exiting with requests in flight"),
    }

    info!("blobcheck shut down");

    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
