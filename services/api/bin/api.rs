//! Main Entrypoint for the Coach API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the scenario catalog and the product knowledge base.
//! 3. Choosing where training records are kept (Postgres or memory).
//! 4. Constructing the coach, the Axum router and its middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use coach_api::{
    config::Config,
    db::PgRecorder,
    delivery::{Notifier, WecomNotifier},
    router::create_router,
    state::AppState,
};
use coach_core::{
    Coach,
    catalog::Catalog,
    knowledge::KnowledgeBase,
    profile::InMemoryProfiles,
    recorder::{MemoryRecorder, TrainingRecorder},
};
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Load Catalog and Knowledge ---
    let catalog = match &config.catalog_path {
        Some(path) => Catalog::load(path)
            .with_context(|| format!("Failed to load catalog from {}", path.display()))?,
        None => Catalog::builtin().context("Built-in catalog is invalid")?,
    };
    let knowledge = Arc::new(match &config.knowledge_path {
        Some(path) => KnowledgeBase::load_dir(path)
            .with_context(|| format!("Failed to load knowledge from {}", path.display()))?,
        None => KnowledgeBase::builtin(),
    });
    info!(
        topics = knowledge.names().count(),
        "Catalog and knowledge base loaded."
    );

    // --- 4. Initialize Training Records ---
    let recorder: Arc<dyn TrainingRecorder> = match &config.database_url {
        Some(url) => {
            let pool = PgPool::connect(url)
                .await
                .context("Failed to connect to database")?;
            let recorder = PgRecorder::new(pool);
            recorder.run_migrations().await?;
            info!("Database connection established and migrations are up-to-date.");
            Arc::new(recorder)
        }
        None => {
            warn!("DATABASE_URL is not set; training records are kept in memory only.");
            Arc::new(MemoryRecorder::new())
        }
    };

    // --- 5. Initialize Shared Services ---
    let notifier: Option<Arc<dyn Notifier>> = match &config.wecom_webhook_url {
        Some(url) => Some(Arc::new(WecomNotifier::new(url.clone())?)),
        None => None,
    };

    let coach = Coach::new(
        config.coach.clone(),
        Arc::new(catalog),
        knowledge.clone(),
        Arc::new(InMemoryProfiles::new()),
        recorder,
    );

    let app_state = Arc::new(AppState {
        coach: Arc::new(coach),
        knowledge,
        notifier,
    });

    // --- 6. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 7. Start Server ---
    info!(
        max_turns = config.coach.max_turns(),
        wecom = config.wecom_webhook_url.is_some(),
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
