use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a bearer token. A token sent here anyway is still verified
/// by the global `authenticate` middleware, but nothing on these routes reads the result.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers and container health checks.
        .route("/health", get(handlers::health_check))
        // POST /members
        // Registration. Roles are decided here from the email, once.
        .route("/members", post(handlers::register_member))
        // POST /auth/login
        // Credentials in the body; tokens come back in the Authorization and Refresh headers.
        .route("/auth/login", post(handlers::login))
        // POST /auth/refresh
        // Refresh token in the Refresh header; a new access token comes back in Authorization.
        .route("/auth/refresh", post(handlers::refresh_token))
}
