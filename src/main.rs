// main.rs
use meross_rest::{
    cloud, config::Settings, handlers, metrics::setup_metrics, models::AppState,
    session::SessionManager, utils, worker::Worker,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn build_logger() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,tower_http=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    build_logger()?;

    let settings = Settings::new()
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    tracing::debug!("Active configuration: {:?}", settings);

    if settings.metrics.enabled {
        setup_metrics(settings.metrics.port)?;
    }

    let (state, channels) = AppState::new();
    let state = Arc::new(state);

    let credentials = settings.meross.credentials();
    if credentials.is_none() {
        tracing::warn!("Meross email or password missing, the device loop will not start");
    }
    let connector = cloud::connector_for(
        settings.meross.backend,
        &settings.meross.device_type,
        credentials.as_ref(),
    )?;
    if settings.meross.backend == Some(cloud::CloudBackend::Simulated) {
        tracing::warn!("Using the in-process simulated device cloud, no real device is switched");
    }
    let manager = SessionManager::new(
        connector,
        credentials,
        settings.meross.api_base_url.clone(),
        settings.meross.device_type.clone(),
    );
    let worker = Worker::new(manager, channels, settings.meross.poll_interval());
    let worker_task = tokio::spawn(worker.run());

    let app = handlers::router(state.clone());

    let listener = tokio::net::TcpListener::bind(&settings.server.address)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind address: {}", e))?;

    tracing::info!("Server started on {}", settings.server.address);

    let shutdown_state = Arc::clone(&state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            utils::shutdown_signal().await;
            tracing::info!("Shutting down");
            shutdown_state.shutdown.request();
        })
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    // Covers the server stopping for reasons other than a signal.
    state.shutdown.request();
    match worker_task.await {
        Ok(Ok(())) => tracing::info!("Worker loop stopped"),
        Ok(Err(e)) => return Err(anyhow::anyhow!("Worker loop failed: {}", e)),
        Err(e) => return Err(anyhow::anyhow!("Worker task aborted: {}", e)),
    }

    Ok(())
}
