use axum::{Extension, Router, middleware, response::IntoResponse, routing::get, serve};
use shared::config::server::{Config, DatabaseConfig, LogFormat};
use sqlx::postgres::PgPoolOptions;
use std::{
    net::SocketAddr,
    sync::{Arc, OnceLock},
    time::Duration,
};
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::{
    app_state::AppState,
    db::bootstrap,
    handlers,
    middleware::{
        auth::auth_middleware,
        request_context::{self, RequestIdState},
    },
    realtime::{ConnectionHub, MessageRouter, SharedHub, SharedRouter},
    routes,
    store::{MemoryConversationStore, PgConversationStore, SharedStore},
    tracer,
};
use axum::http::{HeaderValue, StatusCode, header};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn metrics_handle() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn metrics_endpoint(Extension(handle): Extension<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4"),
        )],
        handle.render(),
    )
}

/// Initializes the tracing subscriber for logging using the provided configuration.
pub fn initialize_tracing(config: &Config) -> String {
    let env_filter = build_env_filter(config);

    let fmt_builder = fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    if matches!(config.logging.format, LogFormat::Json) {
        fmt_builder.json().with_ansi(false).init();
    } else {
        fmt_builder.with_ansi(true).init();
    }

    config.logging.level.clone()
}

fn build_env_filter(config: &Config) -> EnvFilter {
    let default_level = config
        .logging
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy()
    })
}

/// Creates a database connection pool from the given database configuration.
///
/// # Errors
/// Returns an error if the database connection pool cannot be created.
pub async fn create_database_pool(db: &DatabaseConfig) -> Result<sqlx::PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(db.max_connections)
        .connect(&db.url)
        .await?;
    metrics::gauge!("db_pool_max_connections").set(f64::from(db.max_connections));
    Ok(pool)
}

/// Picks the durable store for the given configuration: Postgres when a
/// database URL is set, the volatile in-memory store otherwise.
///
/// # Errors
/// Returns an error if the Postgres pool cannot be created or bootstrapped.
pub async fn create_store(db: &DatabaseConfig) -> Result<SharedStore, Box<dyn std::error::Error>> {
    if db.url.is_empty() {
        warn!("no database URL configured; using the in-memory store, messages will not survive a restart");
        return Ok(Arc::new(MemoryConversationStore::new()));
    }

    let pool = create_database_pool(db).await?;
    bootstrap::ensure_liveness(&pool).await?;
    bootstrap::run(&pool).await?;
    Ok(Arc::new(PgConversationStore::new(pool)))
}

/// Creates the application state with the given store.
pub fn create_app_state(store: Option<SharedStore>) -> Arc<AppState> {
    Arc::new(AppState { store })
}

/// Creates the CORS layer for the application.
pub fn create_cors_layer(config: &Config) -> CorsLayer {
    use http::Method;

    let methods = vec![
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    let mut cors = CorsLayer::new()
        .allow_methods(AllowMethods::list(methods))
        .allow_headers(AllowHeaders::any())
        .allow_credentials(config.server.cors.allow_credentials)
        .max_age(Duration::from_secs(config.server.cors.max_age_seconds));

    if config.server.cors.allowed_origins.is_empty() {
        cors = cors.allow_origin(AllowOrigin::any());
    } else {
        let origins = config
            .server
            .cors
            .allowed_origins
            .iter()
            .filter_map(|origin| http::HeaderValue::from_str(origin).ok())
            .collect::<Vec<_>>();
        cors = cors.allow_origin(AllowOrigin::list(origins));
    }

    cors
}

/// Creates the API router. Every API route, the stream included, sits
/// behind the auth middleware: no identity, no access, no registration.
pub fn create_api_router() -> Router<Arc<AppState>> {
    handlers::conversations::routes()
        .merge(handlers::messages::routes())
        .route("/api/stream", get(handlers::stream::sse_handler))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Creates the main application router with all middleware and routes.
pub fn create_app_router(
    state: Arc<AppState>,
    config: Arc<Config>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let hub: SharedHub = Arc::new(ConnectionHub::new(config.stream.channel_capacity));

    // The mutation pipeline always has a store behind it; when the state
    // carries none the volatile store stands in, which only happens in
    // half-configured test setups.
    let store: SharedStore = state
        .store
        .clone()
        .unwrap_or_else(|| Arc::new(MemoryConversationStore::new()));
    let message_router: SharedRouter = Arc::new(MessageRouter::new(
        store,
        Arc::clone(&hub),
        config.db.op_timeout(),
    ));

    let cors = create_cors_layer(&config);
    let request_id_state = RequestIdState::from_config(&config);

    Router::new()
        .merge(create_api_router())
        .merge(routes::health::create_health_router())
        .merge(routes::openapi::openapi_routes())
        .route("/metrics", get(metrics_endpoint))
        .layer(Extension(config.clone()))
        .layer(Extension(metrics_handle))
        .layer(Extension(hub))
        .layer(Extension(message_router))
        .layer(cors)
        .layer(tracer::create_trace_layer())
        .layer(middleware::from_fn_with_state(
            request_id_state,
            request_context::assign_request_id,
        ))
        .with_state(state)
}

/// Creates the graceful shutdown signal handler.
pub async fn create_shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutting down...");
}

/// Starts the backend server and binds it to the configured port.
///
/// # Errors
/// Returns an error if the server fails to start.
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    initialize_tracing(&config);
    info!("Starting server...");

    let metrics_handle = metrics_handle();
    let config = Arc::new(config);

    let store = create_store(&config.db).await?;
    let state = create_app_state(Some(store));

    let app = create_app_router(state, config.clone(), metrics_handle.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    let shutdown_signal = create_shutdown_signal();

    serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    Ok(())
}
