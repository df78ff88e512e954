use anyhow::{Context, Result};
use inventory_api::api::{start_api_server, AppState};
use inventory_api::cleanup::CleanupQueue;
use inventory_api::config::{Config, ServiceConfig};
use inventory_api::metrics::init_metrics;
use inventory_api::object_store::{ObjectStore, S3ObjectStore};
use inventory_api::repository;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal outside local development
    let dotenv = dotenvy::dotenv();

    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service);

    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!(error = %e, "Failed to read .env file");
        }
    }

    info!(
        service = %config.service.name,
        "Starting inventory API"
    );

    // Initialize metrics
    let metrics = init_metrics()?;

    // Initialize components
    let pool = repository::connect(&config.database)
        .await
        .context("Failed to initialize database pool")?;

    // Run migrations if enabled
    if config.database.run_migrations {
        repository::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
    }

    let store: Arc<dyn ObjectStore> = Arc::new(
        S3ObjectStore::new(&config.s3)
            .await
            .context("Failed to initialize S3 object store")?,
    );

    let cleanup = CleanupQueue::new(pool.clone(), store.clone(), config.cleanup.max_attempts);

    // Spawn cleanup sweeper task
    let shutdown = CancellationToken::new();
    let sweeper_handle = tokio::spawn(cleanup.clone().run(
        config.cleanup_poll_interval(),
        config.cleanup.batch_size,
        shutdown.clone(),
    ));

    // Create API state
    let api_state = AppState {
        pool: pool.clone(),
        store,
        cleanup,
        uploads: config.upload.clone(),
        service_name: config.service.name.clone(),
        metrics: Some(metrics),
    };

    let server_shutdown = shutdown.clone();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_shutdown.cancel();
    });

    info!("Inventory API started successfully");

    if let Err(e) = start_api_server(api_state, &config.api, async move {
        server_shutdown.cancelled().await
    })
    .await
    {
        error!(error = %e, "API server error");
        shutdown.cancel();
    }

    info!("Shutting down inventory API");

    if let Err(e) = sweeper_handle.await {
        warn!(error = %e, "Cleanup sweeper did not stop cleanly");
    }
    pool.close().await;

    info!("Inventory API stopped");

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(config: &ServiceConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.log_format == "pretty" {
        registry.with(fmt::layer().pretty()).init();
    } else {
        registry.with(fmt::layer().json()).init();
    }
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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
