//! Aliment Backend
//!
//! REST service for food items with conditional-GET caching headers, bearer
//! token accounts and a WebSocket feed of change events, persisted to
//! JSON-lines files.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod realtime;

use std::sync::Arc;

use axum::{
    http::header::{ETAG, LAST_MODIFIED},
    middleware,
    routing::{get, post, put, MethodRouter},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::TokenService;
use config::{Config, CorsPolicy};
use db::{AlimentRepository, UserRepository};
use realtime::Notifier;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub aliments: Arc<AlimentRepository>,
    pub users: Arc<UserRepository>,
    pub tokens: Arc<TokenService>,
    pub notifier: Arc<Notifier>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(aliments: AlimentRepository, users: UserRepository, config: Config) -> Self {
        let tokens = TokenService::new(config.token_secret.as_bytes(), config.token_expiry);
        Self {
            aliments: Arc::new(aliments),
            users: Arc::new(users),
            tokens: Arc::new(tokens),
            notifier: Arc::new(Notifier::default()),
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Aliment Backend");
    tracing::info!("Item store: {:?}", config.item_store_path);
    tracing::info!("User store: {:?}", config.user_store_path);
    tracing::info!("Bind address: {}", config.bind_addr());

    if config.auth_enabled && config.token_secret == config::DEV_TOKEN_SECRET {
        tracing::warn!("Using the development token secret (ALIMENT_TOKEN_SECRET is not set)");
    }
    if !config.auth_enabled && config.protect_item_writes {
        tracing::warn!("Item writes require tokens but signup/login are disabled");
    }

    // Open the record store
    let (aliments, users) =
        db::init_stores(&config.item_store_path, &config.user_store_path).await?;

    // Seed fixture items
    tracing::info!("Seeding items (mode: {})", config.item_seed.as_str());
    let seeded = db::seed_aliments(&aliments, config.item_seed).await?;
    tracing::info!(
        "Item store ready: {} aliments ({} seeded)",
        aliments.count().await,
        seeded
    );

    let bind_addr = config.bind_addr();
    let state = AppState::new(aliments, users, config);

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // Items
    let mut router = Router::new()
        .route(
            "/Aliment",
            get(api::list_aliments).merge(guard_item_writes(&state, post(api::create_aliment))),
        )
        .route(
            "/Aliment/{name}",
            get(api::get_aliment).merge(guard_item_writes(
                &state,
                put(api::update_aliment).delete(api::delete_aliment),
            )),
        )
        // Realtime feed
        .route("/ws", get(realtime::realtime_socket))
        // Health check
        .route("/health", get(health_check));

    // Accounts
    if state.config.auth_enabled {
        let bearer = middleware::from_fn_with_state(state.tokens.clone(), auth::require_bearer);
        router = router.route("/api/signup", post(api::signup)).route(
            "/api/auth/session",
            post(api::login).merge(get(api::current_session).route_layer(bearer)),
        );
    }

    router
        .layer(cors_layer(&state.config.cors))
        .layer(CatchPanicLayer::custom(errors::panic_response))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
        .with_state(state)
}

/// Require a bearer token on item writes when configured to.
fn guard_item_writes(
    state: &AppState,
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    if state.config.protect_item_writes {
        route.route_layer(middleware::from_fn_with_state(
            state.tokens.clone(),
            auth::require_bearer,
        ))
    } else {
        route
    }
}

fn cors_layer(policy: &CorsPolicy) -> CorsLayer {
    let layer = match policy {
        CorsPolicy::Any => CorsLayer::new().allow_origin(Any),
        CorsPolicy::Origins(origins) => CorsLayer::new().allow_origin(origins.clone()),
        CorsPolicy::Disabled => return CorsLayer::new(),
    };
    layer
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([ETAG, LAST_MODIFIED])
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
