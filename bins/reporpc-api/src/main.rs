mod handlers;
mod routes;
mod metrics;

use anyhow::Context;
use reporpc_common::{BindingTable, Config};
use reporpc_engine::Dispatcher;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

pub struct AppState {
    pub dispatcher: Dispatcher,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    // Initialize tracing subscriber
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        )
        .with_target(false);
    if config.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("reporpc API booting...");

    metrics::init_metrics();
    info!("Metrics registry initialized");

    // Load project bindings
    let bindings = BindingTable::load_or_default(&config.projects_config_path)
        .with_context(|| format!("Failed to load project bindings from {}", config.projects_config_path))?;

    for binding in bindings.iter() {
        info!(
            project = %binding.project,
            interpreter = ?binding.interpreter,
            workdir = %binding.workdir.display(),
            "Project bound"
        );
    }

    let dispatcher = Dispatcher::new(bindings)
        .with_timeout(Duration::from_millis(config.default_timeout_ms));

    let addr = format!("0.0.0.0:{}", config.port);
    let state = Arc::new(AppState {
        dispatcher,
        config: Arc::new(config),
    });

    let app = routes::app(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("HTTP server listening on {}", addr);
    info!("Ready to accept batches");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
