use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Every handler here takes an `AuthUser`, and the whole router sits behind the
/// `auth_middleware` route layer, so an anonymous or rejected request never reaches them.
/// Ownership, role and status rules are decided by the policy inside each operation.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Members ---
        // GET/PATCH/DELETE /members/{id}
        // Profile, partial update and quit. Self or admin only.
        .route(
            "/members/{id}",
            get(handlers::get_member)
                .patch(handlers::update_member)
                .delete(handlers::quit_member),
        )
        // GET /members/{id}/boards
        // All of a member's boards, any status.
        .route("/members/{id}/boards", get(handlers::member_boards))
        // --- Boards ---
        // POST/GET /boards
        // Post a question (ACTIVE members only) or page through non-deleted boards.
        .route("/boards", post(handlers::create_board).get(handlers::list_boards))
        // GET/PATCH/DELETE /boards/{id}
        // Read (counts a view, enforces SECRET), author-only update and soft delete.
        .route(
            "/boards/{id}",
            get(handlers::get_board)
                .patch(handlers::update_board)
                .delete(handlers::delete_board),
        )
        // --- Answer ---
        // POST/PATCH/DELETE /boards/{id}/comment
        // Admin-only. A board holds at most one answer.
        .route(
            "/boards/{id}/comment",
            post(handlers::create_comment)
                .patch(handlers::update_comment)
                .delete(handlers::delete_comment),
        )
}
