//! Route configuration and setup

use crate::auth::middleware::{auth_middleware, AuthState};
use crate::constants::{API_PREFIX, MULTIPART_OVERHEAD_BYTES};
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use docshare_core::Config;
use docshare_infra::{request_id_middleware, security_filter_middleware, RequestSecurityFilter};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
///
/// Layers, outermost first: request id, trace, security filter, CORS, body limit,
/// panic catcher. The security filter sits outside everything that can fail so its
/// headers reach every response.
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;
    let security_filter = Arc::new(RequestSecurityFilter::from_config(&config.security)?);
    let auth_state = AuthState {
        token_provider: state.auth.token_provider.clone(),
    };

    let protected_routes = protected_routes().route_layer(from_fn_with_state(
        Arc::new(auth_state),
        auth_middleware,
    ));
    let api_routes = public_routes().merge(protected_routes);

    let body_limit = config
        .uploads
        .max_upload_size_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let app = Router::new()
        .nest(API_PREFIX, api_routes)
        .layer(CatchPanicLayer::new())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(from_fn_with_state(security_filter, security_filter_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id_middleware))
        .with_state(state);

    Ok(app)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}

/// Public routes (no authentication required)
fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/auth/login", post(handlers::auth::login))
}

/// Protected routes (bearer token required)
fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/me", get(handlers::auth::me))
        .route("/uploads/check", post(handlers::uploads::check_upload))
        .route(
            "/uploads/sanitize-name",
            post(handlers::uploads::sanitize_name),
        )
        .route("/documents", post(handlers::documents::upload_document))
        .route("/sanitize", post(handlers::sanitize::sanitize_text))
}
