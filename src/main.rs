use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use txstats::config::{config_path, Logging, ServiceConfig, CONFIG_PATH_ENV};
use txstats::handlers::spawn_server;
use txstats::window::Aggregator;

struct ServiceOrchestrator {
    config: ServiceConfig,
    aggregator: Arc<Aggregator>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<Result<()>>>,
}

impl ServiceOrchestrator {
    fn new(config: ServiceConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            config,
            aggregator: Arc::new(Aggregator::with_system_clock()),
            shutdown_tx,
            tasks: Vec::new(),
        }
    }

    #[instrument(skip(self))]
    async fn start_all_services(&mut self) -> Result<()> {
        let addr = self.config.bind_address()?;

        let server = spawn_server(addr, Arc::clone(&self.aggregator), self.shutdown_tx.subscribe())
            .with_context(|| format!("failed to bind {}", addr))?;

        let api_task = tokio::spawn(async move {
            match server.task.await {
                Ok(Ok(())) => {
                    info!("Statistics API completed successfully");
                    Ok(())
                }
                Ok(Err(e)) => {
                    error!("Statistics API error: {}", e);
                    Err(e.into())
                }
                Err(e) => Err(e.into()),
            }
        });
        self.tasks.push(api_task);

        info!("✅ Statistics API started");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn shutdown_all(&mut self) -> Result<()> {
        info!("🛑 Shutting down all services");

        let _ = self.shutdown_tx.send(());
        debug!("Shutdown signal sent to all services");

        for (i, task) in self.tasks.drain(..).enumerate() {
            match task.await {
                Ok(Ok(())) => info!("✅ Service {} shut down cleanly", i + 1),
                Ok(Err(e)) => warn!("⚠️  Service {} error during shutdown: {}", i + 1, e),
                Err(e) => error!("❌ Service {} task failed: {}", i + 1, e),
            }
        }

        let final_stats = self.aggregator.snapshot();
        info!(
            count = final_stats.count,
            sum = final_stats.sum,
            "Window at shutdown"
        );
        Ok(())
    }
}

fn init_tracing(logging: &Logging) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&logging.directory)
        .with_context(|| format!("failed to create log directory {}", logging.directory))?;

    let file_appender = tracing_appender::rolling::daily(&logging.directory, &logging.file_prefix);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_level(true)
        .compact();

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .json()
        .with_current_span(false)
        .with_span_list(true);

    let default_level = logging.default_level.clone();
    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logging is not up yet, so config errors go straight to stderr
    let config = ServiceConfig::load().context("invalid configuration")?;
    let _guard = init_tracing(&config.logging)?;

    info!("📈 Transaction statistics service");
    match config_path() {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No {} set, using default configuration", CONFIG_PATH_ENV),
    }
    info!("Window: last 60 seconds, bind address {}", config.server.bind_address);

    let mut orchestrator = ServiceOrchestrator::new(config);

    if let Err(e) = orchestrator.start_all_services().await {
        error!("Failed to start services: {}", e);
        return Err(e);
    }
    info!("Press Ctrl+C to shutdown");

    match signal::ctrl_c().await {
        Ok(()) => info!("🛑 Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    orchestrator.shutdown_all().await?;

    info!("👋 Shutdown complete");
    Ok(())
}
