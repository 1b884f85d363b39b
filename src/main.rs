//! makerboard server entry point.
//!
//! Starts the Axum HTTP server backed by PostgreSQL.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use makerboard::api;
use makerboard::app_state::AppState;
use makerboard::config::BoardConfig;
use makerboard::service::{PostService, RecommendService};
use makerboard::storage::{PostgresStorage, Storage};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = BoardConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting makerboard");

    // Connect to PostgreSQL
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await?;

    if config.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("migrations applied");
    }

    // Build storage and service layers
    let storage: Arc<dyn Storage> = Arc::new(PostgresStorage::new(pool));
    let post_service = Arc::new(PostService::new(Arc::clone(&storage)));
    let recommend_service = Arc::new(RecommendService::new(Arc::clone(&storage)));

    // Build application state
    let app_state = AppState {
        post_service,
        recommend_service,
    };

    // Build router
    let app = build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Assembles the router with middleware (and the swagger UI when the
/// feature is enabled).
fn build_app(app_state: AppState) -> Router {
    let router = api::build_router();

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::ApiDoc::openapi()),
        )
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
