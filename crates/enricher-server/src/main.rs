use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use enricher_client::{BrowserExtractor, BrowserExtractorConfig, TabularFiles};
use enricher_core::config::env_or;
use enricher_core::{
    BatchScheduler, JobRegistry, JobService, OutputConfig, OutputStage, SchedulerConfig,
};
use enricher_server::routes;
use enricher_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("enricher=info".parse()?))
        .with_target(false)
        .init();

    let port: u16 = env_or("ENRICHER_SERVER_PORT", 8080)?;
    let max_upload_bytes: usize = env_or("ENRICHER_MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?;
    let addr = format!("0.0.0.0:{port}");

    let scheduler_config = SchedulerConfig::from_env()?;
    let output_config = OutputConfig::from_env()?;
    tokio::fs::create_dir_all(&output_config.output_dir)
        .await
        .with_context(|| format!("creating {}", output_config.output_dir.display()))?;

    let browser_config = BrowserExtractorConfig::from_env()
        .within_attempt_timeout(scheduler_config.extraction_timeout);
    let extractor = BrowserExtractor::with_config(browser_config)
        .await
        .context("starting headless browser")?;

    let registry = JobRegistry::new();
    let scheduler = BatchScheduler::new(
        extractor,
        TabularFiles,
        OutputStage::new(TabularFiles, output_config.clone()),
        registry.clone(),
        scheduler_config,
    );
    let service = JobService::new(registry.clone(), Arc::new(scheduler));

    let state = Arc::new(AppState {
        service,
        source: output_config.source.clone(),
        upload_dir: std::env::temp_dir().join("enricher-uploads"),
        max_upload_bytes,
    });

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!(output_dir = %output_config.output_dir.display(), "Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    Ok(())
}

async fn shutdown_signal(registry: JobRegistry) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!(jobs = registry.len(), "Shutdown signal received");
    registry.shutdown();
}
