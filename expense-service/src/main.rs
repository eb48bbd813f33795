use std::net::SocketAddr;
use std::sync::Arc;

use expense_service::{
    build_router,
    config::{ExpenseConfig, StoreBackend},
    services::{metrics::init_metrics, ExpenseStore, MockStore, MongoStore},
    AppState,
};
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = ExpenseConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    init_metrics().map_err(|e| AppError::InternalError(anyhow::anyhow!(e)))?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        store = %config.store.backend,
        "Starting expense service"
    );

    let store = open_store(&config).await?;
    let state = AppState::new(config.clone(), store);
    tracing::info!("Rate limiters initialized: Login, Register");

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn open_store(config: &ExpenseConfig) -> Result<Arc<dyn ExpenseStore>, AppError> {
    match (config.store.backend, &config.store.mongodb) {
        (StoreBackend::Mongo, Some(mongo)) => {
            tracing::info!("Initializing database connection");
            let store = MongoStore::connect(&mongo.uri, &mongo.database).await?;
            store.initialize_indexes().await?;
            tracing::info!("Database initialized successfully");
            Ok(Arc::new(store))
        }
        (StoreBackend::Mongo, None) => Err(AppError::ConfigError(anyhow::anyhow!(
            "MongoDB settings are required for the mongo store backend"
        ))),
        (StoreBackend::Memory, _) => {
            tracing::warn!("Using in-memory store");
            Ok(Arc::new(MockStore::new()))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
