//! Order assistant - conversational slot filling for a commerce backend
//!
//! Classifies each chat message, collects the details a task needs, asks for
//! confirmation, and hands the finished conversation to the backend.

mod api;
mod backend;
mod config;
mod dialog;
mod error;
mod manager;
mod nlu;
mod session;

use api::{create_router, AppState};
use axum::http::Method;
use backend::{BackendDispatcher, CommerceBackend, HttpCommerceBackend, UnconfiguredBackend};
use config::AppConfig;
use manager::DialogManager;
use nlu::{GeminiClassifier, IntentClassifier, IntentResolver, UnconfiguredClassifier};
use session::{ExpiryReaper, InMemorySessionStore, SessionStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is normal outside local development
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "order_assistant=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    if let Ok(path) = dotenv {
        tracing::info!(path = %path.display(), "Loaded environment file");
    }

    let config = AppConfig::from_env();

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let classifier: Arc<dyn IntentClassifier> = match &config.nlu.url {
        Some(url) => Arc::new(GeminiClassifier::new(
            http.clone(),
            url.clone(),
            config.nlu.api_key.clone(),
        )),
        None => {
            tracing::warn!("GEMINI_API_URL not set; every message will use the fallback intent");
            Arc::new(UnconfiguredClassifier)
        }
    };

    let backend: Arc<dyn CommerceBackend> = match &config.backend.url {
        Some(url) => Arc::new(HttpCommerceBackend::new(
            http.clone(),
            url.clone(),
            config.backend.auth.clone(),
        )),
        None => {
            tracing::warn!("CPI_API_URL not set; dispatched requests will report an error");
            Arc::new(UnconfiguredBackend)
        }
    };

    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    store.init().await;

    let manager = Arc::new(DialogManager::new(
        store.clone(),
        IntentResolver::new(classifier, config.nlu.timeout),
        BackendDispatcher::new(backend, config.backend.timeout),
    ));

    let shutdown = CancellationToken::new();
    let reaper = ExpiryReaper::new(
        store,
        config.reaper_interval.max(Duration::from_secs(1)),
        config.session_ttl,
    )
    .spawn(shutdown.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let state = AppState::new(manager.clone(), config.cookie_max_age);
    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Order assistant listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    shutdown.cancel();
    if let Err(e) = reaper.await {
        tracing::warn!(error = %e, "Session reaper did not stop cleanly");
    }
    manager.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
