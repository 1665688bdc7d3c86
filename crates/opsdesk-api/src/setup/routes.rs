//! Route configuration and setup

use crate::auth::middleware::{auth_middleware, AuthFailureLimiter, AuthState};
use crate::constants::API_PREFIX;
use crate::handlers;
use crate::middleware::request_id_middleware;
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    routing::{get, patch, post},
    Router,
};
use opsdesk_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub async fn setup_routes(
    config: &Config,
    state: Arc<AppState>,
) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;
    let auth_state = setup_auth_middleware(config, &state);

    // Public routes (no authentication required)
    let public_routes = public_routes(state.clone());

    // Protected routes (require a bearer access token)
    let protected_routes = protected_routes(state.clone()).layer(
        axum::middleware::from_fn_with_state(Arc::new(auth_state), auth_middleware),
    );

    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(10_000)
        .max(1);

    let app = public_routes
        .merge(protected_routes)
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(config.request_body_limit_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state);

    Ok(app)
}

fn public_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            &format!("{}/auth/signup", API_PREFIX),
            post(handlers::auth::signup),
        )
        .route(
            &format!("{}/auth/login", API_PREFIX),
            post(handlers::auth::login),
        )
        .route(
            &format!("{}/auth/refresh", API_PREFIX),
            post(handlers::auth::refresh),
        )
        .route(
            &format!("{}/auth/logout", API_PREFIX),
            post(handlers::auth::logout),
        )
        .with_state(state)
}

fn protected_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/organizations", API_PREFIX),
            post(handlers::organizations::create_organization),
        )
        .route(
            &format!("{}/organizations/{{org_id}}", API_PREFIX),
            get(handlers::organizations::get_organization),
        )
        .route(
            &format!("{}/organizations/{{org_id}}/members", API_PREFIX),
            get(handlers::members::list_members).post(handlers::members::add_member),
        )
        .route(
            &format!("{}/organizations/{{org_id}}/members/{{user_id}}", API_PREFIX),
            patch(handlers::members::update_member_role).delete(handlers::members::remove_member),
        )
        .route(
            &format!("{}/organizations/{{org_id}}/audit-log", API_PREFIX),
            get(handlers::audit_log::list_audit_log),
        )
        .route(
            &format!("{}/organizations/{{org_id}}/tickets", API_PREFIX),
            get(handlers::tickets::list_tickets).post(handlers::tickets::create_ticket),
        )
        .route(
            &format!("{}/organizations/{{org_id}}/tickets/{{ticket_id}}", API_PREFIX),
            get(handlers::tickets::get_ticket)
                .patch(handlers::tickets::update_ticket)
                .delete(handlers::tickets::delete_ticket),
        )
        .with_state(state)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins.contains(&"*".to_string()) {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers(Any)
    } else {
        let origins: Result<Vec<HeaderValue>, _> =
            config.cors_origins.iter().map(|o| o.parse()).collect();

        CorsLayer::new()
            .allow_origin(origins?)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
            ])
    };

    Ok(cors)
}

/// Build the auth middleware state from config and shared repositories.
fn setup_auth_middleware(config: &Config, state: &Arc<AppState>) -> AuthState {
    let limiter = if config.auth_max_failures > 0 {
        Some(Arc::new(AuthFailureLimiter::new(
            config.auth_max_failures,
            config.auth_failure_window_secs,
        )))
    } else {
        None
    };

    AuthState {
        jwt_secret: config.jwt_secret.clone(),
        user_repository: state.db.users.clone(),
        auth_failure_limiter: limiter,
    }
}
