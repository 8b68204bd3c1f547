//! API layer - HTTP handlers and routing
//!
//! - `/api/v1/...` JSON endpoints (auth, blogs, dashboard, admin, categories)
//! - `/`, `/blogs`, `/blogs/{id}` server-rendered pages
//! - `/media/...` uploaded files

pub mod admin;
pub mod auth;
pub mod blogs;
pub mod common;
pub mod dashboard;
pub mod middleware;
pub mod responses;

use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

use crate::cache::create_cache;
use crate::config::Config;
use crate::db::repositories::{SqlxBlogRepository, SqlxSessionRepository, SqlxUserRepository};
use crate::db::DynDatabasePool;
use crate::services::{classifier, BlogService, LoginRateLimiter, MediaStore, UserService};
use crate::web::{self, PageRenderer};

pub use middleware::{ApiError, AppState, AuthenticatedUser, Viewer};

/// Multipart overhead allowed on top of the file size limit
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

impl AppState {
    /// Wire repositories and services over an open, migrated pool
    pub fn build(config: &Config, pool: DynDatabasePool) -> Result<Self> {
        let classifier = classifier::from_config(&config.classifier)
            .context("Failed to build category classifier")?;
        if !config.classifier.is_enabled() {
            tracing::warn!(
                "No classifier API key configured; new blogs will be filed under General"
            );
        }

        let media = Arc::new(MediaStore::new(config.upload.clone()));
        let user_service = Arc::new(UserService::with_session_expiration(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            config.session.expiration_days,
        ));
        let blog_service = Arc::new(BlogService::new(
            SqlxBlogRepository::boxed(pool.clone()),
            classifier,
            create_cache(&config.cache),
            media.clone(),
        ));

        Ok(Self {
            pool,
            user_service,
            blog_service,
            media,
            rate_limiter: Arc::new(LoginRateLimiter::new()),
            pages: Arc::new(PageRenderer::new()?),
        })
    }
}

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .merge(blogs::protected_router())
        .route("/dashboard", get(dashboard::dashboard))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let reader_routes = blogs::public_router().route_layer(axum_middleware::from_fn_with_state(
        state,
        middleware::optional_auth,
    ));

    Router::new()
        .route("/health", get(health))
        .route("/categories", get(blogs::list_categories))
        .nest("/auth", auth::public_router())
        .merge(reader_routes)
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete application router
pub fn build_router(state: AppState, config: &Config) -> Result<Router> {
    let origin = config
        .server
        .cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", config.server.cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    let pages = web::router().route_layer(axum_middleware::from_fn_with_state(
        state.clone(),
        middleware::optional_auth,
    ));

    let body_limit = usize::try_from(config.upload.max_file_size + MULTIPART_OVERHEAD)
        .unwrap_or(usize::MAX);

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .merge(pages)
        .nest_service("/media", ServeDir::new(&config.upload.path))
        .fallback(web::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// GET /api/v1/health
async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match state.pool.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
