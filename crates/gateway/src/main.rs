//! Borrowed Brain API Gateway
//!
//! The entry point for all external API requests. Handles:
//! - Authentication and authorization
//! - Rate limiting
//! - Podcast search and library management
//! - Sync triggering and status surfaces
//! - Chat sessions with streamed RAG answers

mod handlers;
mod middleware;

use axum::{
    routing::{delete, get, post},
    Router,
};
use borrowedbrain_common::{
    auth::JwtManager,
    cache::{Cache, CacheConfig},
    config::AppConfig,
    db::DbPool,
    embeddings::{create_embedder, Embedder},
    gateways::{CatalogApi, CatalogClient, ChatModel, OpenAIChatClient},
    metrics,
    queue::{Queue, QueueConfig},
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn, Level};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub cache: Option<Arc<Cache>>,
    pub queue: Option<Arc<Queue>>,
    pub catalog: Arc<dyn CatalogApi>,
    pub embedder: Arc<dyn Embedder>,
    pub chat_model: Arc<dyn ChatModel>,
    pub jwt: JwtManager,
}

impl axum::extract::FromRef<AppState> for JwtManager {
    fn from_ref(state: &AppState) -> JwtManager {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .json()
        .init();

    info!("Starting Borrowed Brain API Gateway v{}", borrowedbrain_common::VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    let config = Arc::new(config);

    // Initialize metrics
    metrics::register_metrics();

    if config.observability.metrics_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!(addr = %addr, "Prometheus exporter listening");
    }

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;

    // Redis is an optimization; the gateway runs without it
    let cache = match Cache::new(CacheConfig {
        url: config.redis.url.clone(),
        default_ttl_secs: config.redis.default_ttl_secs,
        ..CacheConfig::default()
    })
    .await
    {
        Ok(cache) => Some(Arc::new(cache)),
        Err(e) => {
            warn!(error = %e, "Redis unavailable, continuing without cache");
            None
        }
    };

    // Sync queue (the job runner); sync triggering is disabled without it
    let queue = match config.queue.sync_queue_url {
        Some(ref url) => {
            info!(url = %url, "Connecting to sync queue...");
            let queue_config = QueueConfig {
                url: url.clone(),
                dlq_url: config.queue.dlq_url.clone(),
                visibility_timeout: config.queue.visibility_timeout_secs as i32,
                wait_time_seconds: config.queue.poll_timeout_secs as i32,
                max_messages: config.queue.batch_size as i32,
            };
            Some(Arc::new(Queue::new(queue_config).await?))
        }
        None => {
            warn!("Sync queue not configured, sync triggering disabled");
            None
        }
    };

    // External gateway clients
    let catalog: Arc<dyn CatalogApi> = Arc::new(CatalogClient::new(&config.catalog));
    let embedder = create_embedder(&config.embedding);
    let chat_model: Arc<dyn ChatModel> = Arc::new(OpenAIChatClient::new(&config.chat));

    info!(
        embedding_model = %embedder.model_name(),
        chat_model = %chat_model.model_name(),
        "Gateway clients initialized"
    );

    let jwt_secret = config.auth.jwt_secret.clone().unwrap_or_else(|| {
        warn!("auth.jwt_secret not set, using development secret");
        "development-secret".to_string()
    });
    let jwt = JwtManager::new(&jwt_secret, config.auth.jwt_expiration_secs);

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        cache,
        queue,
        catalog,
        embedder,
        chat_model,
        jwt,
    };

    // Build the router
    let app = create_router(state, &config);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState, config: &AppConfig) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let api_routes = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Podcast endpoints
        .route("/podcasts/search", get(handlers::podcasts::search_podcasts))
        .route("/podcasts/{id}/episodes", get(handlers::podcasts::list_episodes))

        // Library endpoints
        .route("/library", post(handlers::library::add_to_library))
        .route("/library", get(handlers::library::list_library))
        .route("/library/{podcast_id}", delete(handlers::library::remove_from_library))

        // Sync endpoints
        .route("/episodes/{id}/sync", post(handlers::sync::trigger_sync))
        .route("/episodes/{id}/transcript", get(handlers::sync::get_transcript_status))
        .route("/sync-jobs/{id}", get(handlers::sync::get_sync_job))

        // Chat session endpoints
        .route("/sessions", post(handlers::sessions::create_session))
        .route("/sessions/{id}", get(handlers::sessions::get_session))
        .route("/sessions/{id}/messages", get(handlers::sessions::list_messages))
        .route("/sessions/{id}/messages", post(handlers::chat::post_message));

    let mut router = Router::new()
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id);

    if config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            config.rate_limit.requests_per_second,
            config.rate_limit.burst,
        );
        router = router.layer(axum::middleware::from_fn(
            move |request: axum::extract::Request, next: axum::middleware::Next| {
                let limiter = limiter.clone();
                async move {
                    middleware::rate_limit::rate_limit_middleware(request, next, limiter).await
                }
            },
        ));
    }

    router.with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
