mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod mail;
mod middleware;
mod models;
mod policy;
mod routes;
mod service;
mod storage;
mod tracing_config;
mod utils;

use axum::http::{
    HeaderValue, Method,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use config::Config;
use db::DBClient;
use dotenv::dotenv;
use mail::Mailer;
use std::sync::Arc;
use storage::SnapshotStore;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    pub env: Arc<Config>,
    pub db_client: DBClient,
    pub mailer: Mailer,
    pub store: SnapshotStore,
}

#[tokio::main]
async fn main() {
    // keep the guard alive so the file writer flushes on shutdown
    let _guard = tracing_config::init_tracing();

    dotenv().ok();

    let config = match Config::init() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let db_client = match DBClient::connect(&config.database_url).await {
        Ok(db_client) => {
            tracing::info!("Connection to the database is successful");
            db_client
        }
        Err(e) => {
            tracing::error!("Failed to connect to the database: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = db_client.migrate().await {
        tracing::error!("Failed to run migrations: {}", e);
        std::process::exit(1);
    }

    let store = SnapshotStore::new(&config.uploads_dir);
    if let Err(e) = store.init().await {
        tracing::error!(dir = %store.dir().display(), "Failed to create uploads directory: {}", e);
        std::process::exit(1);
    }

    match service::question::ensure_catalog(&db_client).await {
        Ok(true) => tracing::info!("Question catalog was empty, defaults loaded"),
        Ok(false) => {}
        Err(e) => {
            tracing::error!("Failed to load the default question catalog: {}", e);
            std::process::exit(1);
        }
    }

    match service::user::ensure_default_admin(
        &db_client,
        &config.default_user,
        &config.default_email,
        &config.default_password,
    )
    .await
    {
        Ok(Some(admin)) => tracing::info!(user_id = %admin.id, "Default admin created"),
        Ok(None) => {}
        Err(e) => {
            tracing::error!("Failed to create the default admin: {}", e);
            std::process::exit(1);
        }
    }

    // scheduler stops when dropped
    let _scheduler = match db_client.start_cleanup_task().await {
        Ok(scheduler) => Some(scheduler),
        Err(e) => {
            tracing::warn!("Cleanup scheduler not started: {}", e);
            None
        }
    };

    let mailer = Mailer::new(config.smtp.clone());
    if !mailer.is_configured() {
        tracing::warn!("SMTP is not configured, e-mails will not be sent");
    }

    let frontend_origin = match config.frontend_url.parse::<HeaderValue>() {
        Ok(origin) => origin,
        Err(e) => {
            tracing::error!("FRONTEND_URL is not a valid origin: {}", e);
            std::process::exit(1);
        }
    };
    let cors = CorsLayer::new()
        .allow_origin(frontend_origin)
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    let port = config.port;
    let app_state = AppState {
        env: Arc::new(config),
        db_client,
        mailer,
        store,
    };

    let app = routes::create_router(app_state).layer(cors);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind port {}: {}", port, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server is running on http://localhost:{}", port);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
