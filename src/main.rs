use std::sync::Arc;
use std::time::Instant;

use axum::{routing::get, Router};
use sqlx::postgres::PgPoolOptions;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod error;
mod models;
mod services;

use config::Config;
use services::{email::EmailDispatcher, social::SocialTokenVerifier};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
    pub email: EmailDispatcher,
    pub social: Arc<SocialTokenVerifier>,
    pub started_at: Instant,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "account_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load();
    tracing::info!("Starting server in {} mode", config.server.environment);

    // Initialize database pool
    let db = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    tracing::info!("Connected to PostgreSQL");

    // Run migrations
    sqlx::migrate!("./migrations").run(&db).await?;
    tracing::info!("Database migrations completed");

    let http = reqwest::Client::new();

    // Outbound email worker
    let email = EmailDispatcher::start(config.email.clone(), http.clone());

    // Provider token verifier (JWKS cache)
    let social = Arc::new(SocialTokenVerifier::new(http));

    // Create app state
    let state = AppState {
        db: db.clone(),
        config: Arc::new(config.clone()),
        email,
        social,
        started_at: Instant::now(),
    };

    // Seed the first super admin off the startup path
    {
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = services::seed::seed_super_admin(db, &config).await {
                tracing::error!("Error seeding super admin: {}", e);
            }
        });
    }

    // Build router
    let app = Router::new()
        .route("/health", get(api::handlers::health::health_check))
        .nest_service("/uploads", ServeDir::new(&config.upload.dir))
        .nest("/api/v1", api::router::create_router(state.clone()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received ctrl-c, shutting down"),
        _ = terminate => tracing::info!("Received terminate signal, shutting down"),
    }
}
