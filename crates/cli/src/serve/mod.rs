//! `euprava serve` -- HTTP JSON API for the citizen-services portal.
//!
//! Runs the request workflow, catalog, identity and user administration
//! behind `axum` + `tokio`.
//!
//! Security features:
//! - Bearer session tokens on every route except health, register and login
//! - Per-IP rate limiting (configurable, default 120 req/min)
//! - Request body size limit
//! - CORS headers (permissive, can be disabled in config)
//!
//! Endpoints:
//! - GET    /health
//! - POST   /auth/register, /auth/login, /auth/logout
//! - GET    /auth/me
//! - GET    /service-requests              - Role-scoped list (?status, ?service_id)
//! - POST   /service-requests              - Create a DRAFT (citizen)
//! - GET    /service-requests/{id}
//! - PUT    /service-requests/{id}         - Edit notes, attachment, form data
//! - DELETE /service-requests/{id}
//! - PATCH  /service-requests/{id}/submit
//! - PATCH  /service-requests/{id}/assign
//! - PATCH  /service-requests/{id}/status  - Approve or reject
//! - PATCH  /service-requests/{id}/payment
//! - GET    /services, /services/{id}      - POST/PUT/DELETE for admins
//! - GET    /institutions, /institutions/{id} (admin) - POST/PUT/DELETE (admin)
//! - GET    /types, /types/{id}            - POST/PUT/DELETE for admins
//! - GET    /users, /users/{id}            - PATCH /users/{id}/role, DELETE (admin)
//!
//! Success bodies are `{"data": ...}`; errors are `{"message", "errors"?}`,
//! including malformed ids, unreadable or oversized bodies and unrouted methods.

mod auth;
mod catalog;
mod error;
mod extract;
mod handlers;
mod middleware;
mod requests;
mod state;
mod users;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::routing::{get, patch, post};
use axum::{middleware as axum_middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use self::middleware::{auth_middleware, rate_limit_middleware};
use self::state::{AppState, Backend};
use crate::config::PortalConfig;
use crate::seed;

/// Rate limit window duration in seconds (1 minute).
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Build the router over `state`.
fn router(state: Arc<AppState>, config: &PortalConfig) -> Router {
    let app = Router::new()
        .route("/health", get(handlers::handle_health))
        .route("/auth/register", post(auth::handle_register))
        .route("/auth/login", post(auth::handle_login))
        .route("/auth/logout", post(auth::handle_logout))
        .route("/auth/me", get(auth::handle_me))
        .route(
            "/service-requests",
            get(requests::handle_list).post(requests::handle_create),
        )
        .route(
            "/service-requests/{id}",
            get(requests::handle_get)
                .put(requests::handle_edit)
                .delete(requests::handle_delete),
        )
        .route("/service-requests/{id}/submit", patch(requests::handle_submit))
        .route("/service-requests/{id}/assign", patch(requests::handle_assign))
        .route("/service-requests/{id}/status", patch(requests::handle_decide))
        .route("/service-requests/{id}/payment", patch(requests::handle_payment))
        .route(
            "/services",
            get(catalog::handle_list_services).post(catalog::handle_create_service),
        )
        .route(
            "/services/{id}",
            get(catalog::handle_get_service)
                .put(catalog::handle_update_service)
                .delete(catalog::handle_delete_service),
        )
        .route(
            "/institutions",
            get(catalog::handle_list_institutions).post(catalog::handle_create_institution),
        )
        .route(
            "/institutions/{id}",
            get(catalog::handle_get_institution)
                .put(catalog::handle_update_institution)
                .delete(catalog::handle_delete_institution),
        )
        .route(
            "/types",
            get(catalog::handle_list_types).post(catalog::handle_create_type),
        )
        .route(
            "/types/{id}",
            get(catalog::handle_get_type)
                .put(catalog::handle_update_type)
                .delete(catalog::handle_delete_type),
        )
        .route("/users", get(users::handle_list_users))
        .route(
            "/users/{id}",
            get(users::handle_get_user).delete(users::handle_delete_user),
        )
        .route("/users/{id}/role", patch(users::handle_change_role))
        .fallback(handlers::handle_not_found)
        .method_not_allowed_fallback(handlers::handle_method_not_allowed)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(TraceLayer::new_for_http());

    let app = if config.server.enable_cors {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                ])
                .allow_headers(Any),
        )
    } else {
        app
    };

    app.with_state(state)
}

/// Seed a fresh in-memory backend from `config` and serve until Ctrl+C.
pub async fn start_server(config: PortalConfig) -> Result<(), Box<dyn std::error::Error>> {
    let storage = Arc::new(Backend::new());
    let state = Arc::new(AppState::new(
        Arc::clone(&storage),
        config.server.rate_limit_per_minute,
    ));
    seed::apply(&config.seed, storage.as_ref(), &state.identity).await?;

    tracing::info!(
        rate_limit = state.rate_limiter.max_requests,
        max_body_size = config.server.max_body_size,
        cors = config.server.enable_cors,
        "server configured"
    );

    let app = router(Arc::clone(&state), &config);

    let listener = tokio::net::TcpListener::bind(config.server.listen).await?;
    tracing::info!(addr = %config.server.listen, "eUprava portal listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received shutdown signal"),
        Err(e) => {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
