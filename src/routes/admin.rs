use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Nested under `/admin`. Authentication is enforced by the same route layer as the
/// authenticated routes; the admin role itself is checked by the policy in each handler.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/members?limit=&offset=
        // Every member regardless of status, for moderation.
        .route("/members", get(handlers::list_members))
}
